//! Scripts the engine runs in the page.
//!
//! Each script starts with a marker comment line, so in-memory drivers can
//! recognise the request without a JavaScript engine. Arguments are embedded
//! as JSON literals; the element the script acts on is `arguments[0]`.

use serde_json::Value;

const MARKER: &str = "// tellerprobe:";

/// A script understood by the interaction engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Script {
    /// Forced click, bypassing overlays
    Click,
    /// Visible texts of a `<select>`'s options
    OptionTexts,
    /// Select the option whose visible text matches exactly
    SelectByText(String),
    /// Visible text of the selected option
    SelectedText,
}

impl Script {
    fn tag(&self) -> &'static str {
        match self {
            Self::Click => "click",
            Self::OptionTexts => "option-texts",
            Self::SelectByText(_) => "select-by-text",
            Self::SelectedText => "selected-text",
        }
    }

    /// JavaScript source
    #[must_use]
    pub fn render(&self) -> String {
        let body = match self {
            Self::Click => "arguments[0].click();\nreturn true;".to_string(),
            Self::OptionTexts => {
                "return Array.from(arguments[0].options).map(o => o.text.trim());".to_string()
            }
            Self::SelectByText(text) => format!(
                "const wanted = {};\n\
                 const el = arguments[0];\n\
                 const idx = Array.from(el.options).findIndex(o => o.text.trim() === wanted);\n\
                 if (idx < 0) {{ return false; }}\n\
                 el.selectedIndex = idx;\n\
                 el.dispatchEvent(new Event('change', {{ bubbles: true }}));\n\
                 return true;",
                Value::String(text.clone())
            ),
            Self::SelectedText => {
                "const el = arguments[0];\n\
                 return el.selectedIndex < 0 ? '' : el.options[el.selectedIndex].text.trim();"
                    .to_string()
            }
        };
        format!("{MARKER}{}\n{body}", self.tag())
    }

    /// Recognise a rendered script
    #[must_use]
    pub fn recognize(source: &str) -> Option<Self> {
        let mut lines = source.lines();
        let tag = lines.next()?.strip_prefix(MARKER)?;
        match tag {
            "click" => Some(Self::Click),
            "option-texts" => Some(Self::OptionTexts),
            "selected-text" => Some(Self::SelectedText),
            "select-by-text" => {
                let literal = lines
                    .next()?
                    .strip_prefix("const wanted = ")?
                    .strip_suffix(';')?;
                match serde_json::from_str(literal).ok()? {
                    Value::String(text) => Some(Self::SelectByText(text)),
                    _ => None,
                }
            }
            _ => None,
        }
    }
}
