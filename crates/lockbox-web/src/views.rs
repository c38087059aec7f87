use axum::response::Html;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ViewError {
    #[error("no view named {0:?}")]
    Unknown(String),
}

const VIEWS: &[(&str, &str)] = &[
    ("home", include_str!("../views/home.html")),
    ("signup", include_str!("../views/signup.html")),
    ("login", include_str!("../views/login.html")),
    ("access", include_str!("../views/access.html")),
];

/// Look up a compiled-in view by name.
pub fn render(name: &str) -> Result<Html<&'static str>, ViewError> {
    VIEWS
        .iter()
        .find(|(view, _)| *view == name)
        .map(|(_, body)| Html(*body))
        .ok_or_else(|| ViewError::Unknown(name.to_string()))
}
