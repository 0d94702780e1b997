use std::borrow::Cow;
use std::fs;
use std::path::Path;

/// Maps detector class ids to display names.
///
/// Ids without a name render as `class{id}`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClassNames {
    names: Vec<String>,
}

impl ClassNames {
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }

    /// Parses one name per line; blank lines and `#` comments are skipped.
    pub fn from_lines(text: &str) -> Self {
        let names = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(str::to_string)
            .collect();
        Self { names }
    }

    /// Reads a newline-separated labels file.
    pub fn load(path: &Path) -> std::io::Result<Self> {
        fs::read_to_string(path).map(|text| Self::from_lines(&text))
    }

    pub fn name(&self, class_id: usize) -> Cow<'_, str> {
        match self.names.get(class_id) {
            Some(name) => Cow::Borrowed(name.as_str()),
            None => Cow::Owned(format!("class{class_id}")),
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
