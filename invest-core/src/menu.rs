//! Button actions and the screens handed to the transport.
//!
//! Every [`Action`] round-trips through a short callback string so a chat
//! transport can attach it to a button and hand it back verbatim.

use crate::export::ExportFormat;
use crate::store::ExampleId;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A discrete user action, usually a button press.
///
/// Submitting free text is not an action; see [`crate::bot::Input`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Open the story prompt.
    Begin,
    /// Take the stored judgment of candidate `i` (zero-based).
    PickSimilar(usize),
    /// Ignore the candidates and have the pending story judged.
    UseOwn,
    FixWithJudge,
    Improve,
    ImproveAgain,
    AnalyzeImproved,
    OpenExport,
    ExportAs(ExportFormat),
    SaveToCorpus,
    Back,
    Restart,
    ShowHistory,
    /// Zero-based corpus page.
    ShowDatabase(usize),
    ShowStory(ExampleId),
    Help,
    Stats,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown action: {0:?}")]
pub struct ParseActionError(pub String);

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Begin => f.write_str("analyze_invest"),
            Action::PickSimilar(i) => write!(f, "use_similar_{i}"),
            Action::UseOwn => f.write_str("use_own"),
            Action::FixWithJudge => f.write_str("fix_with_llm"),
            Action::Improve => f.write_str("improve_story"),
            Action::ImproveAgain => f.write_str("improve_again"),
            Action::AnalyzeImproved => f.write_str("analyze_improved"),
            Action::OpenExport => f.write_str("export"),
            Action::ExportAs(format) => write!(f, "export_{}", format.extension()),
            Action::SaveToCorpus => f.write_str("add_to_db"),
            Action::Back => f.write_str("back"),
            Action::Restart => f.write_str("restart"),
            Action::ShowHistory => f.write_str("show_improvement_history"),
            Action::ShowDatabase(page) => write!(f, "db_page_{page}"),
            Action::ShowStory(id) => write!(f, "db_story_{id}"),
            Action::Help => f.write_str("help"),
            Action::Stats => f.write_str("stats"),
        }
    }
}

impl FromStr for Action {
    type Err = ParseActionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let unknown = || ParseActionError(s.to_string());

        let action = match s {
            "analyze_invest" => Action::Begin,
            "use_own" => Action::UseOwn,
            "fix_with_llm" => Action::FixWithJudge,
            "improve_story" => Action::Improve,
            "improve_again" => Action::ImproveAgain,
            "analyze_improved" => Action::AnalyzeImproved,
            "export" => Action::OpenExport,
            "add_to_db" => Action::SaveToCorpus,
            "back" => Action::Back,
            "restart" => Action::Restart,
            "show_improvement_history" => Action::ShowHistory,
            "help" => Action::Help,
            "stats" => Action::Stats,
            _ => {
                if let Some(i) = s.strip_prefix("use_similar_") {
                    Action::PickSimilar(i.parse().map_err(|_| unknown())?)
                } else if let Some(page) = s.strip_prefix("db_page_") {
                    Action::ShowDatabase(page.parse().map_err(|_| unknown())?)
                } else if let Some(id) = s.strip_prefix("db_story_") {
                    Action::ShowStory(ExampleId(id.parse().map_err(|_| unknown())?))
                } else if let Some(ext) = s.strip_prefix("export_") {
                    Action::ExportAs(ExportFormat::from_extension(ext).ok_or_else(unknown)?)
                } else {
                    return Err(unknown());
                }
            }
        };
        Ok(action)
    }
}

/// One labeled button.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MenuItem {
    pub label: String,
    #[serde(serialize_with = "serialize_action")]
    pub action: Action,
}

fn serialize_action<S: serde::Serializer>(action: &Action, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(action)
}

/// Ordered list of buttons.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Menu {
    items: Vec<MenuItem>,
}

impl Menu {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn item(mut self, label: impl Into<String>, action: Action) -> Self {
        self.items.push(MenuItem {
            label: label.into(),
            action,
        });
        self
    }

    /// Add the item only when `condition` holds.
    pub fn item_if(self, condition: bool, label: impl Into<String>, action: Action) -> Self {
        if condition {
            self.item(label, action)
        } else {
            self
        }
    }

    pub fn items(&self) -> &[MenuItem] {
        &self.items
    }

    pub fn contains(&self, action: Action) -> bool {
        self.items.iter().any(|i| i.action == action)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// What the transport shows: text plus buttons.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Screen {
    pub text: String,
    pub menu: Menu,
    /// Stable identifier of the kind of screen.
    pub label: String,
}

impl Screen {
    pub fn new(label: impl Into<String>, text: impl Into<String>, menu: Menu) -> Self {
        Self {
            text: text.into(),
            menu,
            label: label.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_callback_round_trip() {
        let actions = [
            Action::Begin,
            Action::PickSimilar(2),
            Action::UseOwn,
            Action::FixWithJudge,
            Action::Improve,
            Action::ImproveAgain,
            Action::AnalyzeImproved,
            Action::OpenExport,
            Action::ExportAs(ExportFormat::Text),
            Action::ExportAs(ExportFormat::Csv),
            Action::SaveToCorpus,
            Action::Back,
            Action::Restart,
            Action::ShowHistory,
            Action::ShowDatabase(3),
            Action::ShowStory(ExampleId(42)),
            Action::Help,
            Action::Stats,
        ];
        for action in actions {
            let data = action.to_string();
            assert_eq!(data.parse::<Action>(), Ok(action), "{data}");
        }
    }

    #[test]
    fn test_known_callback_strings() {
        assert_eq!("use_similar_0".parse(), Ok(Action::PickSimilar(0)));
        assert_eq!("export_csv".parse(), Ok(Action::ExportAs(ExportFormat::Csv)));
        assert_eq!(Action::ShowDatabase(1).to_string(), "db_page_1");
    }

    #[test]
    fn test_rejects_garbage() {
        assert!("use_similar_x".parse::<Action>().is_err());
        assert!("export_pdf".parse::<Action>().is_err());
        assert!("dance".parse::<Action>().is_err());
    }

    #[test]
    fn test_menu_builder() {
        let menu = Menu::new()
            .item("Назад", Action::Back)
            .item_if(false, "Сохранить", Action::SaveToCorpus)
            .item_if(true, "Заново", Action::Restart);
        assert_eq!(menu.items().len(), 2);
        assert!(menu.contains(Action::Restart));
        assert!(!menu.contains(Action::SaveToCorpus));

        let json = serde_json::to_value(&menu).unwrap();
        assert_eq!(json["items"][0]["action"], "back");
    }
}
