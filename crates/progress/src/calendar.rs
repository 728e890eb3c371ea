//! Special-occasion missions keyed by calendar date.

use chrono::{Datelike, NaiveDate};
use ritual_core::Mode;
use serde::{Deserialize, Serialize};

/// A yearly date with its own mission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecialDayRule {
    /// Month (1-12)
    pub month: u32,
    /// Day of month
    pub day: u32,
    /// Occasion name
    pub name: String,
    /// Mission for solo rituals, `None` if the day is not special for solo
    pub solo_mission: Option<String>,
    /// Mission for couple rituals, `None` if the day is not special for couples
    pub couple_mission: Option<String>,
}

impl SpecialDayRule {
    /// Mission for a mode on this occasion.
    pub fn mission(&self, mode: Mode) -> Option<&str> {
        match mode {
            Mode::Solo => self.solo_mission.as_deref(),
            Mode::Couple => self.couple_mission.as_deref(),
        }
        .filter(|text| !text.trim().is_empty())
    }

    fn matches(&self, date: NaiveDate) -> bool {
        date.month() == self.month && date.day() == self.day
    }
}

/// Set of special-day rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecialDayCalendar {
    rules: Vec<SpecialDayRule>,
}

impl SpecialDayCalendar {
    /// Calendar with the given rules.
    pub fn new(rules: Vec<SpecialDayRule>) -> Self {
        Self { rules }
    }

    /// Calendar with no special days.
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// The rule and mission for `date`, if it is special for `mode`.
    pub fn mission_for(&self, date: NaiveDate, mode: Mode) -> Option<(&SpecialDayRule, &str)> {
        self.rules
            .iter()
            .filter(|rule| rule.matches(date))
            .find_map(|rule| rule.mission(mode).map(|text| (rule, text)))
    }

    /// Configured rules.
    pub fn rules(&self) -> &[SpecialDayRule] {
        &self.rules
    }
}

impl Default for SpecialDayCalendar {
    fn default() -> Self {
        Self::new(vec![
            rule(1, 1, "새해", Some("새해에 나에게 바라는 한 가지를 적어 보세요."), Some("올해 둘이 꼭 함께 하고 싶은 일을 적어 보세요.")),
            rule(2, 14, "발렌타인데이", None, Some("상대에게 전하지 못한 고마움을 편지로 적어 보세요.")),
            rule(3, 14, "화이트데이", None, Some("상대가 나를 설레게 했던 순간을 떠올려 보세요.")),
            rule(5, 8, "어버이날", Some("부모님께 전하고 싶은 마음을 적어 보세요."), None),
            rule(12, 25, "크리스마스", Some("올 한 해 나에게 주고 싶은 선물은 무엇인가요?"), Some("올해 서로에게 받은 가장 큰 선물을 적어 보세요.")),
            rule(12, 31, "한 해의 마지막 날", Some("올해의 나를 세 단어로 표현해 보세요."), Some("올해 우리의 관계를 세 단어로 표현해 보세요.")),
        ])
    }
}

fn rule(month: u32, day: u32, name: &str, solo: Option<&str>, couple: Option<&str>) -> SpecialDayRule {
    SpecialDayRule {
        month,
        day,
        name: name.to_string(),
        solo_mission: solo.map(str::to_string),
        couple_mission: couple.map(str::to_string),
    }
}
