//! Attribute tokenization

/// One attribute's text, produced lazily so skipped attributes cost nothing.
pub struct AttributeText {
    pub attribute: u8,
    pub producer: Box<dyn FnOnce() -> String + Send>,
}

impl AttributeText {
    pub fn new(attribute: u8, producer: impl FnOnce() -> String + Send + 'static) -> Self {
        Self {
            attribute,
            producer: Box::new(producer),
        }
    }
}

/// Split text into lowercased tokens on non-alphanumeric boundaries.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}
