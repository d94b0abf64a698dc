use serde::{Deserialize, Serialize};

/// Generation models offered by the prompt engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ModelId {
    #[serde(rename = "gemini-2.5-pro")]
    Gemini25Pro,
    #[default]
    #[serde(rename = "gemini-2.5-flash")]
    Gemini25Flash,
    #[serde(rename = "gemini-2.5-flash-lite")]
    Gemini25FlashLite,
    #[serde(rename = "gemini-2.0-flash")]
    Gemini20Flash,
    #[serde(rename = "gemini-1.5-pro")]
    Gemini15Pro,
    #[serde(rename = "gemini-1.5-flash")]
    Gemini15Flash,
}

impl ModelId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelId::Gemini25Pro => "gemini-2.5-pro",
            ModelId::Gemini25Flash => "gemini-2.5-flash",
            ModelId::Gemini25FlashLite => "gemini-2.5-flash-lite",
            ModelId::Gemini20Flash => "gemini-2.0-flash",
            ModelId::Gemini15Pro => "gemini-1.5-pro",
            ModelId::Gemini15Flash => "gemini-1.5-flash",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::all()
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s.trim()))
    }

    pub fn all() -> Vec<ModelId> {
        vec![
            ModelId::Gemini25Pro,
            ModelId::Gemini25Flash,
            ModelId::Gemini25FlashLite,
            ModelId::Gemini20Flash,
            ModelId::Gemini15Pro,
            ModelId::Gemini15Flash,
        ]
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ModelId::Gemini25Pro => "Gemini 2.5 Pro (Thinking)",
            ModelId::Gemini25Flash => "Gemini 2.5 Flash (Best Value)",
            ModelId::Gemini25FlashLite => "Gemini 2.5 Flash-Lite (Fastest)",
            ModelId::Gemini20Flash => "Gemini 2.0 Flash",
            ModelId::Gemini15Pro => "Gemini 1.5 Pro",
            ModelId::Gemini15Flash => "Gemini 1.5 Flash",
        }
    }

    /// Next entry in picker order, wrapping around
    pub fn next(&self) -> Self {
        let all = Self::all();
        let i = all.iter().position(|m| m == self).unwrap_or(0);
        all[(i + 1) % all.len()]
    }
}

/// How the backend should treat the query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Engineer,
    Critic,
    Direct,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Engineer => "engineer",
            Mode::Critic => "critic",
            Mode::Direct => "direct",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "engineer" => Some(Mode::Engineer),
            "critic" => Some(Mode::Critic),
            "direct" => Some(Mode::Direct),
            _ => None,
        }
    }

    pub fn all() -> Vec<Mode> {
        vec![Mode::Engineer, Mode::Critic, Mode::Direct]
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Mode::Engineer => "Prompt Engineer",
            Mode::Critic => "Critic Mode",
            Mode::Direct => "Direct Answer",
        }
    }

    pub fn next(&self) -> Self {
        match self {
            Mode::Engineer => Mode::Critic,
            Mode::Critic => Mode::Direct,
            Mode::Direct => Mode::Engineer,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn six_models_with_unique_labels() {
        let all = ModelId::all();
        assert_eq!(all.len(), 6);
        for model in &all {
            assert_eq!(ModelId::parse(model.as_str()), Some(*model));
        }
    }

    #[test]
    fn serde_uses_wire_labels() {
        let json = serde_json::to_string(&ModelId::Gemini25FlashLite).unwrap();
        assert_eq!(json, "\"gemini-2.5-flash-lite\"");
        let json = serde_json::to_string(&Mode::Critic).unwrap();
        assert_eq!(json, "\"critic\"");
    }

    #[test]
    fn next_cycles_through_every_entry() {
        let mut model = ModelId::Gemini15Flash;
        model = model.next();
        assert_eq!(model, ModelId::Gemini25Pro);
        assert_eq!(Mode::Direct.next(), Mode::Engineer);
    }

    #[test]
    fn parse_rejects_unknown() {
        assert_eq!(ModelId::parse("gemini-3.0-ultra"), None);
        assert_eq!(Mode::parse(""), None);
        assert_eq!(Mode::parse("CRITIC"), Some(Mode::Critic));
    }
}
