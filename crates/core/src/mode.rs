//! Per-mode configuration for the progression engine.
//!
//! Solo and couple rituals share one engine; everything that differs between
//! them lives here.

use serde::{Deserialize, Serialize};
use crate::config::ConfigError;
use crate::namespace::{Mode, Namespace};

/// Parameters that specialize the engine for one mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeConfig {
    /// Which mode these parameters belong to
    pub mode: Mode,

    /// Minimum reflection length in characters
    pub min_reflection_length: usize,

    /// Highest reachable level
    pub max_level: u32,

    /// Phase names, index = level - 1
    pub phase_labels: Vec<String>,

    /// Built-in missions, index = day - 1
    pub default_missions: Vec<String>,

    /// Mission used once the built-in list is exhausted
    pub terminal_mission: String,
}

impl ModeConfig {
    /// Solo growth ritual.
    pub fn solo() -> Self {
        Self {
            mode: Mode::Solo,
            min_reflection_length: 1,
            max_level: 6,
            phase_labels: strings(&["씨앗", "새싹", "줄기", "꽃봉오리", "꽃", "열매"]),
            default_missions: strings(&[
                "오늘 나를 가장 웃게 만든 순간을 적어 보세요.",
                "요즘 나를 힘들게 하는 생각 하나를 솔직하게 꺼내 보세요.",
                "내가 좋아하는 나의 모습 세 가지를 떠올려 보세요.",
                "최근에 미뤄 둔 일 하나와 그 이유를 돌아보세요.",
                "오늘 나에게 해 주고 싶은 말을 편지처럼 써 보세요.",
                "나를 편안하게 만드는 장소나 습관을 기록해 보세요.",
                "일주일 전의 나와 지금의 나는 무엇이 달라졌나요?",
            ]),
            terminal_mission: "오늘 하루 가장 감사했던 순간을 떠올려 보세요.".to_string(),
        }
    }

    /// Couple relationship ritual.
    pub fn couple() -> Self {
        Self {
            mode: Mode::Couple,
            min_reflection_length: 5,
            max_level: 7,
            phase_labels: strings(&["설렘", "알아감", "신뢰", "이해", "성장", "동행", "하나됨"]),
            default_missions: strings(&[
                "처음 만났던 날 상대에게 느꼈던 첫인상을 적어 보세요.",
                "최근 상대에게 고마웠던 일을 구체적으로 적어 보세요.",
                "우리가 함께 가장 크게 웃었던 순간은 언제였나요?",
                "상대에게 아직 말하지 못한 작은 바람을 적어 보세요.",
                "서로 다퉜던 일 하나를 떠올리고 지금의 생각을 나눠 보세요.",
                "함께 해 보고 싶은 작은 모험 하나를 계획해 보세요.",
                "상대의 어떤 모습이 나를 더 좋은 사람으로 만드나요?",
            ]),
            terminal_mission: "오늘 서로에게 전하고 싶은 한 마디를 적어 보세요.".to_string(),
        }
    }

    /// Preset for a mode.
    pub fn for_mode(mode: Mode) -> Self {
        match mode {
            Mode::Solo => Self::solo(),
            Mode::Couple => Self::couple(),
        }
    }

    /// Namespace for an identity in this mode.
    pub fn namespace(&self, id: impl Into<String>) -> Namespace {
        Namespace::new(self.mode, id)
    }

    /// Phase label for a level; the index is clamped to the label list.
    pub fn phase_label(&self, level: u32) -> &str {
        if self.phase_labels.is_empty() {
            return "";
        }
        let index = (level.max(1) as usize - 1).min(self.phase_labels.len() - 1);
        &self.phase_labels[index]
    }

    /// Built-in mission for a day, falling back to the terminal mission.
    pub fn default_mission(&self, day: u32) -> &str {
        let index = day.max(1) as usize - 1;
        match self.default_missions.get(index) {
            Some(text) if !text.trim().is_empty() => text,
            _ => &self.terminal_mission,
        }
    }

    /// Check the parameters are usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_level == 0 {
            return Err(ConfigError::Invalid(format!("{} max_level must be at least 1", self.mode)));
        }
        if self.min_reflection_length == 0 {
            return Err(ConfigError::Invalid(format!(
                "{} min_reflection_length must be at least 1",
                self.mode
            )));
        }
        if self.terminal_mission.trim().is_empty() {
            return Err(ConfigError::Invalid(format!("{} terminal_mission must not be empty", self.mode)));
        }
        Ok(())
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
