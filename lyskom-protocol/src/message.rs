//! Protocol call numbers and request argument encoding.

use chrono::{DateTime, TimeZone};
use chrono_tz::OffsetComponents;
use std::fmt::Write as _;

use crate::hollerith;
use crate::wire;

/// The Protocol A call numbers the engine speaks. The numeric value is what
/// goes on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum CallNo {
    Logout = 1,
    ChangeConference = 2,
    ChangeName = 3,
    ChangeWhatIAmDoing = 4,
    SetPrivBits = 7,
    SetPasswd = 8,
    DeleteConf = 11,
    SubMember = 15,
    SetPresentation = 16,
    SetEtcMotd = 17,
    SetSupervisor = 18,
    SetPermittedSubmitters = 19,
    SetSuperConf = 20,
    SetConfType = 21,
    SetGarbNice = 22,
    GetMarks = 23,
    GetText = 25,
    MarkAsRead = 27,
    DeleteText = 29,
    AddRecipient = 30,
    SubRecipient = 31,
    AddComment = 32,
    SubComment = 33,
    GetTime = 35,
    AddFootnote = 37,
    SubFootnote = 38,
    SetUnread = 40,
    SetMotdOfLyskom = 41,
    Enable = 42,
    SyncKom = 43,
    ShutdownKom = 44,
    GetPersonStat = 49,
    GetUnreadConfs = 52,
    SendMessage = 53,
    Disconnect = 55,
    WhoAmI = 56,
    SetUserArea = 57,
    GetLastText = 58,
    FindNextTextNo = 60,
    FindPreviousTextNo = 61,
    Login = 62,
    SetClientVersion = 69,
    GetClientName = 70,
    GetClientVersion = 71,
    MarkText = 72,
    UnmarkText = 73,
    ReZLookup = 74,
    GetVersionInfo = 75,
    LookupZName = 76,
    SetLastRead = 77,
    GetUconfStat = 78,
    SetInfo = 79,
    AcceptAsync = 80,
    QueryAsync = 81,
}

impl CallNo {
    /// The wire-level message number.
    pub fn number(self) -> u32 {
        self as u32
    }
}

/// Accumulates the argument portion of a request line.
///
/// Every value is preceded by a single space, so the result can be appended
/// directly after `<reqID> <call#>`. Integers encode in decimal, booleans as
/// `0`/`1`, strings via Hollerith, arrays via the array grammar, bit-fields
/// as their fixed-width encodings and times as nine-field tuples.
#[derive(Debug, Default)]
pub struct RequestArgs {
    buf: String,
}

impl RequestArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn uint(mut self, value: impl Into<u64>) -> Self {
        let _ = write!(self.buf, " {}", value.into());
        self
    }

    pub fn boolean(mut self, value: bool) -> Self {
        self.buf.push(' ');
        self.buf.push(if value { '1' } else { '0' });
        self
    }

    pub fn string(mut self, value: &str) -> Self {
        self.buf.push(' ');
        hollerith::write(&mut self.buf, value);
        self
    }

    /// Appends an already-encoded fixed-width bit-field.
    pub fn bit_field(mut self, encoded: &str) -> Self {
        self.buf.push(' ');
        self.buf.push_str(encoded);
        self
    }

    pub fn array(mut self, items: &[u32]) -> Self {
        self.buf.push(' ');
        wire::write_u32_array(&mut self.buf, items);
        self
    }

    pub fn time<Tz>(mut self, when: &DateTime<Tz>) -> Self
    where
        Tz: TimeZone,
        Tz::Offset: OffsetComponents,
    {
        self.buf.push(' ');
        wire::write_time(&mut self.buf, when);
        self
    }

    /// The encoded arguments, including the leading space of the first one.
    /// Empty for calls that take no arguments.
    pub fn as_str(&self) -> &str {
        &self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PrivBits;
    use chrono::TimeZone as _;

    #[test]
    fn call_numbers_match_the_protocol() {
        assert_eq!(CallNo::Logout.number(), 1);
        assert_eq!(CallNo::GetMarks.number(), 23);
        assert_eq!(CallNo::Login.number(), 62);
        assert_eq!(CallNo::LookupZName.number(), 76);
        assert_eq!(CallNo::QueryAsync.number(), 81);
    }

    #[test]
    fn args_encode_in_sequence() {
        let args = RequestArgs::new()
            .uint(7u16)
            .string("hemligt")
            .boolean(false);
        assert_eq!(args.as_str(), " 7 7Hhemligt 0");
    }

    #[test]
    fn empty_args_are_empty() {
        assert_eq!(RequestArgs::new().as_str(), "");
    }

    #[test]
    fn bit_field_and_array_arguments() {
        let bits = PrivBits {
            wheel: true,
            ..Default::default()
        };
        let args = RequestArgs::new()
            .uint(5u16)
            .bit_field(&bits.bit_field());
        assert_eq!(args.as_str(), " 5 1000000000000000");

        let args = RequestArgs::new().uint(9u16).array(&[1, 2, 3]);
        assert_eq!(args.as_str(), " 9 3 { 1 2 3 }");
    }

    #[test]
    fn time_argument_uses_the_nine_field_tuple() {
        let when = chrono_tz::Europe::Stockholm
            .with_ymd_and_hms(1997, 7, 19, 22, 6, 49)
            .unwrap();
        let args = RequestArgs::new().time(&when);
        assert_eq!(args.as_str(), " 49 6 22 19 6 97 6 199 1");
    }
}
