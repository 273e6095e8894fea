use std::{fmt, str::FromStr};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::state::{command::CommandError, game::Team, score::JamKey};

/// Penalty codes as written on the penalty tracking sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum PenaltyCode {
    /// `A`
    #[serde(rename = "A")]
    HighBlock,
    /// `B`
    #[serde(rename = "B")]
    BackBlock,
    /// `C`
    #[serde(rename = "C")]
    Directional,
    /// `E`
    #[serde(rename = "E")]
    Elbows,
    /// `F`
    #[serde(rename = "F")]
    Forearms,
    /// `G`
    #[serde(rename = "G")]
    Misconduct,
    /// `H`
    #[serde(rename = "H")]
    BlockWithHead,
    /// `I`
    #[serde(rename = "I")]
    IllegalProcedure,
    /// `L`
    #[serde(rename = "L")]
    LowBlock,
    /// `M`
    #[serde(rename = "M")]
    MultiPlayer,
    /// `N`
    #[serde(rename = "N")]
    Insubordination,
    /// `O`
    #[serde(rename = "O")]
    OutOfBounds,
    /// `P`
    #[serde(rename = "P")]
    OutOfPlay,
    /// `S`
    #[serde(rename = "S")]
    SkatingOutOfBounds,
    /// `U`
    #[serde(rename = "U")]
    Unknown,
    /// `X`
    #[serde(rename = "X")]
    CutTrack,
    /// `Z`
    #[serde(rename = "Z")]
    DelayOfGame,
}

impl PenaltyCode {
    /// Every code, in sheet order.
    pub const ALL: [PenaltyCode; 17] = [
        PenaltyCode::HighBlock,
        PenaltyCode::BackBlock,
        PenaltyCode::Directional,
        PenaltyCode::Elbows,
        PenaltyCode::Forearms,
        PenaltyCode::Misconduct,
        PenaltyCode::BlockWithHead,
        PenaltyCode::IllegalProcedure,
        PenaltyCode::LowBlock,
        PenaltyCode::MultiPlayer,
        PenaltyCode::Insubordination,
        PenaltyCode::OutOfBounds,
        PenaltyCode::OutOfPlay,
        PenaltyCode::SkatingOutOfBounds,
        PenaltyCode::Unknown,
        PenaltyCode::CutTrack,
        PenaltyCode::DelayOfGame,
    ];

    /// Single-letter symbol.
    pub fn symbol(self) -> char {
        match self {
            PenaltyCode::HighBlock => 'A',
            PenaltyCode::BackBlock => 'B',
            PenaltyCode::Directional => 'C',
            PenaltyCode::Elbows => 'E',
            PenaltyCode::Forearms => 'F',
            PenaltyCode::Misconduct => 'G',
            PenaltyCode::BlockWithHead => 'H',
            PenaltyCode::IllegalProcedure => 'I',
            PenaltyCode::LowBlock => 'L',
            PenaltyCode::MultiPlayer => 'M',
            PenaltyCode::Insubordination => 'N',
            PenaltyCode::OutOfBounds => 'O',
            PenaltyCode::OutOfPlay => 'P',
            PenaltyCode::SkatingOutOfBounds => 'S',
            PenaltyCode::Unknown => 'U',
            PenaltyCode::CutTrack => 'X',
            PenaltyCode::DelayOfGame => 'Z',
        }
    }
}

impl TryFrom<char> for PenaltyCode {
    type Error = CommandError;

    fn try_from(symbol: char) -> Result<Self, Self::Error> {
        PenaltyCode::ALL
            .into_iter()
            .find(|code| code.symbol() == symbol.to_ascii_uppercase())
            .ok_or_else(|| {
                CommandError::out_of_range("code", format!("unknown penalty code {symbol:?}"))
            })
    }
}

impl FromStr for PenaltyCode {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.trim().chars();
        match (chars.next(), chars.next()) {
            (Some(symbol), None) => PenaltyCode::try_from(symbol),
            _ => Err(CommandError::out_of_range(
                "code",
                format!("penalty code must be a single letter, got {s:?}"),
            )),
        }
    }
}

impl fmt::Display for PenaltyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// One penalty assessed to a skater.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PenaltyRecord {
    /// Team of the penalized skater.
    pub team: Team,
    /// Skater number.
    pub skater: String,
    /// Period of the jam the penalty is attributed to.
    pub period: u8,
    /// Jam number within the period.
    pub jam: u16,
    /// Penalty code.
    pub code: PenaltyCode,
}

impl PenaltyRecord {
    /// Jam the penalty is attributed to.
    pub fn jam_key(&self) -> JamKey {
        JamKey {
            period: self.period,
            number: self.jam,
        }
    }
}

/// Append-only list of penalties kept in jam order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct PenaltyLedger {
    records: Vec<PenaltyRecord>,
}

impl PenaltyLedger {
    /// Every penalty, ordered by jam then insertion.
    pub fn records(&self) -> &[PenaltyRecord] {
        &self.records
    }

    /// Append a penalty attributed to `jam`.
    ///
    /// Records stay sorted by jam; among records of the same jam, insertion order is kept.
    pub fn record(&mut self, team: Team, skater: String, jam: JamKey, code: PenaltyCode) {
        let at = self.records.partition_point(|existing| existing.jam_key() <= jam);
        self.records.insert(
            at,
            PenaltyRecord {
                team,
                skater,
                period: jam.period,
                jam: jam.number,
                code,
            },
        );
    }

    /// Penalties of one skater. The iterator can be cloned to walk the list again.
    pub fn penalties_for<'a>(
        &'a self,
        team: Team,
        skater: &'a str,
    ) -> impl Iterator<Item = &'a PenaltyRecord> + Clone + 'a {
        self.records
            .iter()
            .filter(move |record| record.team == team && record.skater == skater)
    }

    /// Penalties of a whole team grouped by skater number, numbers sorted.
    pub fn by_skater(&self, team: Team) -> IndexMap<&str, Vec<&PenaltyRecord>> {
        let mut board: IndexMap<&str, Vec<&PenaltyRecord>> = IndexMap::new();
        for record in self.records.iter().filter(|record| record.team == team) {
            board.entry(record.skater.as_str()).or_default().push(record);
        }
        board.sort_keys();
        board
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jam(number: u16) -> JamKey {
        JamKey { period: 1, number }
    }

    #[test]
    fn parses_every_symbol_and_rejects_others() {
        for code in PenaltyCode::ALL {
            assert_eq!(code.to_string().parse::<PenaltyCode>().unwrap(), code);
        }
        assert_eq!("x".parse::<PenaltyCode>().unwrap(), PenaltyCode::CutTrack);
        assert!("D".parse::<PenaltyCode>().is_err());
        assert!("AB".parse::<PenaltyCode>().is_err());
        assert!("".parse::<PenaltyCode>().is_err());
    }

    #[test]
    fn penalties_for_is_restartable_and_ordered() {
        let mut ledger = PenaltyLedger::default();
        ledger.record(Team::Home, "12".into(), jam(3), PenaltyCode::CutTrack);
        ledger.record(Team::Home, "12".into(), jam(3), PenaltyCode::Elbows);
        ledger.record(Team::Away, "12".into(), jam(3), PenaltyCode::LowBlock);
        ledger.record(Team::Home, "12".into(), jam(1), PenaltyCode::Forearms);

        let penalties = ledger.penalties_for(Team::Home, "12");
        let codes: Vec<_> = penalties.clone().map(|record| record.code).collect();
        assert_eq!(
            codes,
            vec![
                PenaltyCode::Forearms,
                PenaltyCode::CutTrack,
                PenaltyCode::Elbows
            ]
        );
        assert_eq!(penalties.count(), 3);
    }

    #[test]
    fn board_groups_by_sorted_skater_number() {
        let mut ledger = PenaltyLedger::default();
        ledger.record(Team::Away, "77".into(), jam(1), PenaltyCode::MultiPlayer);
        ledger.record(Team::Away, "101".into(), jam(2), PenaltyCode::BackBlock);
        ledger.record(Team::Away, "77".into(), jam(4), PenaltyCode::OutOfPlay);

        let board = ledger.by_skater(Team::Away);
        let skaters: Vec<_> = board.keys().copied().collect();
        assert_eq!(skaters, vec!["101", "77"]);
        assert_eq!(board["77"].len(), 2);
        assert!(ledger.by_skater(Team::Home).is_empty());
    }

    #[test]
    fn record_serializes_flat() {
        let mut ledger = PenaltyLedger::default();
        ledger.record(Team::Home, "12".into(), jam(3), PenaltyCode::CutTrack);
        let json = serde_json::to_value(&ledger).unwrap();
        assert_eq!(
            json,
            serde_json::json!([{ "team": "home", "skater": "12", "period": 1, "jam": 3, "code": "X" }])
        );
    }
}
