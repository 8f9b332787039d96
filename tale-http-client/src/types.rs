//! Game and account types reported by the Tale API

use crate::error::TaleError;
use serde::Deserialize;

/// Progress of a third-party authorisation request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthorisationState {
    /// The user has not opened the authorisation page yet
    NotRequested,
    /// Waiting for the user to decide
    Wait,
    /// The user granted access
    Success,
    /// The user refused access
    Reject,
}

impl TryFrom<i64> for AuthorisationState {
    type Error = TaleError;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(AuthorisationState::NotRequested),
            1 => Ok(AuthorisationState::Wait),
            2 => Ok(AuthorisationState::Success),
            3 => Ok(AuthorisationState::Reject),
            other => Err(TaleError::UnexpectedResponse(format!(
                "unknown authorisation state {other}"
            ))),
        }
    }
}

/// Result of an authorisation-state check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorisationStatus {
    pub state: AuthorisationState,
    pub account_id: Option<u64>,
    pub account_name: Option<String>,
}

/// Application details shown to the user on the authorisation page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThirdPartyApp {
    pub name: String,
    pub info: String,
    pub description: String,
}

impl ThirdPartyApp {
    pub fn new(name: impl Into<String>, info: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            info: info.into(),
            description: String::new(),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// What a hero is currently doing, as reported in `action.type`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HeroAction {
    /// Idle between actions
    Nothing,
    /// Following the current quest
    DoQuest,
    /// Fighting a monster
    PveBattle,
    /// Dead, waiting to be resurrected
    Death,
    /// Resting in a town
    InCity,
    /// Recovering health
    Health,
    /// Dropping or sorting items
    Inventory,
    /// Selling loot
    Trade,
    /// Performing a ritual
    Ritual,
    /// Doing a quest-specific step
    QuestAction,
    /// Delegating to another hero
    HeroProxy,
    /// In an arena battle with another hero
    PvpBattle,
    /// Server test action
    Test,
    /// Healing the companion
    CompanionHealth,
    /// Just created
    Initial,
    /// Travelling between places
    Move,
    /// Choosing a route
    SelectWay,
}

impl HeroAction {
    pub fn from_code(code: u8) -> Option<Self> {
        let action = match code {
            0 => HeroAction::Nothing,
            1 => HeroAction::DoQuest,
            3 => HeroAction::PveBattle,
            4 => HeroAction::Death,
            5 => HeroAction::InCity,
            6 => HeroAction::Health,
            7 => HeroAction::Inventory,
            8 => HeroAction::Trade,
            10 => HeroAction::Ritual,
            11 => HeroAction::QuestAction,
            12 => HeroAction::HeroProxy,
            13 => HeroAction::PvpBattle,
            14 => HeroAction::Test,
            15 => HeroAction::CompanionHealth,
            16 => HeroAction::Initial,
            17 => HeroAction::Move,
            18 => HeroAction::SelectWay,
            _ => return None,
        };
        Some(action)
    }

    pub fn code(self) -> u8 {
        match self {
            HeroAction::Nothing => 0,
            HeroAction::DoQuest => 1,
            HeroAction::PveBattle => 3,
            HeroAction::Death => 4,
            HeroAction::InCity => 5,
            HeroAction::Health => 6,
            HeroAction::Inventory => 7,
            HeroAction::Trade => 8,
            HeroAction::Ritual => 10,
            HeroAction::QuestAction => 11,
            HeroAction::HeroProxy => 12,
            HeroAction::PvpBattle => 13,
            HeroAction::Test => 14,
            HeroAction::CompanionHealth => 15,
            HeroAction::Initial => 16,
            HeroAction::Move => 17,
            HeroAction::SelectWay => 18,
        }
    }

    /// Read `data.account.hero.action.type` from a hero info payload
    pub fn from_hero_info(payload: &serde_json::Value) -> Option<Self> {
        let code = payload
            .pointer("/data/account/hero/action/type")?
            .as_u64()?;
        Self::from_code(u8::try_from(code).ok()?)
    }
}

/// `data` of a login response
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct LoginData {
    pub account_id: Option<u64>,
    pub account_name: Option<String>,
}

/// `data` of a request-authorisation response
#[derive(Debug, Deserialize)]
pub(crate) struct AuthorisationRequestData {
    pub authorisation_page: String,
}

/// `data` of an authorisation-state response
#[derive(Debug, Deserialize)]
pub(crate) struct AuthorisationStateData {
    pub state: i64,
    #[serde(default)]
    pub account_id: Option<u64>,
    #[serde(default)]
    pub account_name: Option<String>,
}
