//! Output configuration from TOML (`[output]` section)

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FileOutputFormat {
    Full,
    Synthesis,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileOutputConfig {
    pub format: Option<FileOutputFormat>,
    pub color: bool,
}

impl Default for FileOutputConfig {
    fn default() -> Self {
        Self { format: None, color: true }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_format_deserializes_from_kebab_case() {
        let toml_str = "[output]\nformat = \"synthesis\"\n";
        let config: super::super::FileConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.output.format, Some(FileOutputFormat::Synthesis));
    }

    #[test]
    fn color_defaults_to_true() {
        assert!(FileOutputConfig::default().color);
    }
}
