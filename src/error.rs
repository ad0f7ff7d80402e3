use std::error::Error;
use std::fmt;
use std::io;

#[derive(Debug)]
pub enum PptError {
    Io(io::Error),
    Zip(String),
    Xml(String),
    InvalidTemplate(String),
    Template(String),
    Render(String),
    Http(String),
    Image(String),
    Llm(String),
    Parse(String),
    NotFound(String),
    InvalidRequest(String),
    UnsupportedFormat(String),
}

impl PptError {
    /// HTTP status code used when this error reaches the API layer.
    pub fn status_code(&self) -> u16 {
        match self {
            PptError::NotFound(_) => 404,
            PptError::InvalidRequest(_) | PptError::UnsupportedFormat(_) => 400,
            _ => 500,
        }
    }
}

impl fmt::Display for PptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PptError::Io(err) => write!(f, "IO error: {}", err),
            PptError::Zip(msg) => write!(
                f,
                "ZIP archive error: {} - The package may be corrupted",
                msg
            ),
            PptError::Xml(msg) => write!(f, "XML error: {}", msg),
            PptError::InvalidTemplate(msg) => write!(
                f,
                "Invalid template: {} - Expected a PowerPoint .pptx package",
                msg
            ),
            PptError::Template(msg) => write!(f, "Template error: {}", msg),
            PptError::Render(msg) => write!(f, "Render error: {}", msg),
            PptError::Http(msg) => write!(
                f,
                "Network error: {} - Please check your internet connection",
                msg
            ),
            PptError::Image(msg) => write!(f, "Image error: {}", msg),
            PptError::Llm(msg) => write!(
                f,
                "LLM error: {} - Please check your API configuration",
                msg
            ),
            PptError::Parse(msg) => write!(f, "Parse error: {}", msg),
            PptError::NotFound(msg) => write!(f, "{}", msg),
            PptError::InvalidRequest(msg) => write!(f, "Invalid request: {}", msg),
            PptError::UnsupportedFormat(msg) => write!(
                f,
                "Unsupported format: {} - This file type is not supported",
                msg
            ),
        }
    }
}

impl Error for PptError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            PptError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for PptError {
    fn from(error: io::Error) -> Self {
        PptError::Io(error)
    }
}

impl From<zip::result::ZipError> for PptError {
    fn from(error: zip::result::ZipError) -> Self {
        PptError::Zip(error.to_string())
    }
}

impl From<quick_xml::Error> for PptError {
    fn from(error: quick_xml::Error) -> Self {
        PptError::Xml(error.to_string())
    }
}

impl From<serde_json::Error> for PptError {
    fn from(error: serde_json::Error) -> Self {
        PptError::Parse(error.to_string())
    }
}

impl From<reqwest::Error> for PptError {
    fn from(error: reqwest::Error) -> Self {
        PptError::Http(error.to_string())
    }
}

impl From<image::ImageError> for PptError {
    fn from(error: image::ImageError) -> Self {
        PptError::Image(error.to_string())
    }
}

impl From<String> for PptError {
    fn from(error: String) -> Self {
        PptError::Render(error)
    }
}

impl From<&str> for PptError {
    fn from(error: &str) -> Self {
        PptError::Render(error.to_string())
    }
}
