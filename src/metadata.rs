use thiserror::Error;

pub const NEGATIVE_PROMPT_MARKER: &str = "Negative prompt";
pub const MODEL_HASH_KEY: &str = "Model hash";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("metadata has {0} line(s), expected a prompt line and a parameter line")]
    MissingParameterLine(usize),
    #[error("parameter line is empty")]
    EmptyParameterLine,
    #[error("parameter segment has no ':' separator: {0:?}")]
    MissingColon(String),
    #[error("negative prompt line has no ':' separator: {0:?}")]
    MalformedNegativePrompt(String),
}

/// Generation parameters in the order they appeared on the parameter line.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Fields {
    pairs: Vec<(String, String)>,
}

impl Fields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrites the value of an existing key in place, otherwise appends.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.pairs.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.pairs.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// `key: value, key: value` form of the parameter line.
    pub fn to_line(&self) -> String {
        self.pairs
            .iter()
            .map(|(k, v)| format!("{}: {}", k, v))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedMetadata {
    pub prompt: String,
    pub negative_prompt: Option<String>,
    pub fields: Fields,
}

impl ParsedMetadata {
    pub fn model_hash(&self) -> Option<&str> {
        self.fields.get(MODEL_HASH_KEY)
    }
}

/// Parses a sidecar written as
///
/// ```text
/// <prompt>
/// [Negative prompt: <text>]
/// <key>: <value>, <key>: <value>, ...
/// ```
///
/// The prompt keeps its line terminator. Only the last line is read as parameters.
pub fn parse_metadata(text: &str) -> Result<ParsedMetadata, ParseError> {
    let lines: Vec<&str> = text.split_inclusive('\n').collect();
    if lines.len() < 2 {
        return Err(ParseError::MissingParameterLine(lines.len()));
    }

    let prompt = lines[0].to_string();
    let negative_prompt = parse_negative_prompt(lines[1])?;
    let fields = parse_parameter_line(lines[lines.len() - 1])?;

    Ok(ParsedMetadata {
        prompt,
        negative_prompt,
        fields,
    })
}

fn parse_negative_prompt(line: &str) -> Result<Option<String>, ParseError> {
    if !line.starts_with(NEGATIVE_PROMPT_MARKER) {
        return Ok(None);
    }
    match line.split_once(':') {
        Some((_, value)) => Ok(Some(value.trim().to_string())),
        None => Err(ParseError::MalformedNegativePrompt(line.trim_end().to_string())),
    }
}

pub fn parse_parameter_line(line: &str) -> Result<Fields, ParseError> {
    let line = line.trim();
    if line.is_empty() {
        return Err(ParseError::EmptyParameterLine);
    }
    let mut fields = Fields::new();
    for segment in line.split(',') {
        // 最初の ':' だけで分割する
        let (key, value) = segment
            .split_once(':')
            .ok_or_else(|| ParseError::MissingColon(segment.trim().to_string()))?;
        fields.insert(key.trim(), value.trim());
    }
    Ok(fields)
}
