//! Domain types and their wire representations.
//!
//! Integer widths are part of the protocol contract: conference and person
//! numbers are 16-bit, text and session numbers 32-bit, the small counters
//! (marks, created persons) 16-bit. Bit-fields serialize as fixed-width
//! strings of ASCII `0`/`1`, most significant bit first.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncRead;

use crate::error::CodecError;
use crate::wire;

/// Conference number. Person numbers share this space: a person's letterbox
/// is a conference.
pub type ConfNo = u16;

/// Text number.
pub type TextNo = u32;

/// Session number.
pub type SessionNo = u32;

/// Aux-item number.
pub type AuxNo = u32;

/// Personal privilege bits, a 16-bit field. The six defined bits come first,
/// MSB first; the remaining ten are reserved and always emitted as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivBits {
    pub wheel: bool,
    pub admin: bool,
    pub statistic: bool,
    pub create_persons: bool,
    pub create_conferences: bool,
    pub change_name: bool,
}

impl PrivBits {
    pub fn from_bits(bits: u16) -> Self {
        Self {
            wheel: bits & 0x8000 != 0,
            admin: bits & 0x4000 != 0,
            statistic: bits & 0x2000 != 0,
            create_persons: bits & 0x1000 != 0,
            create_conferences: bits & 0x0800 != 0,
            change_name: bits & 0x0400 != 0,
        }
    }

    pub fn bits(&self) -> u16 {
        let mut bits = 0u16;
        for (set, mask) in [
            (self.wheel, 0x8000),
            (self.admin, 0x4000),
            (self.statistic, 0x2000),
            (self.create_persons, 0x1000),
            (self.create_conferences, 0x0800),
            (self.change_name, 0x0400),
        ] {
            if set {
                bits |= mask;
            }
        }
        bits
    }

    /// The 16-character wire encoding.
    pub fn bit_field(&self) -> String {
        format!("{:016b}", self.bits())
    }

    pub async fn read<R>(reader: &mut R) -> Result<Self, CodecError>
    where
        R: AsyncRead + Unpin,
    {
        Ok(Self::from_bits(wire::read_bitfield(reader, 16).await?))
    }
}

/// Extended conference type, an 8-bit field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtendedConfType {
    pub rd_prot: bool,
    pub original: bool,
    pub secret: bool,
    pub letterbox: bool,
    pub allow_anonymous: bool,
    pub forbid_secret: bool,
    pub reserved2: bool,
    pub reserved3: bool,
}

impl ExtendedConfType {
    pub fn from_bits(bits: u8) -> Self {
        Self {
            rd_prot: bits & 0x80 != 0,
            original: bits & 0x40 != 0,
            secret: bits & 0x20 != 0,
            letterbox: bits & 0x10 != 0,
            allow_anonymous: bits & 0x08 != 0,
            forbid_secret: bits & 0x04 != 0,
            reserved2: bits & 0x02 != 0,
            reserved3: bits & 0x01 != 0,
        }
    }

    pub fn bits(&self) -> u8 {
        let mut bits = 0u8;
        for (set, mask) in [
            (self.rd_prot, 0x80),
            (self.original, 0x40),
            (self.secret, 0x20),
            (self.letterbox, 0x10),
            (self.allow_anonymous, 0x08),
            (self.forbid_secret, 0x04),
            (self.reserved2, 0x02),
            (self.reserved3, 0x01),
        ] {
            if set {
                bits |= mask;
            }
        }
        bits
    }

    /// The 8-character wire encoding.
    pub fn bit_field(&self) -> String {
        format!("{:08b}", self.bits())
    }

    pub async fn read<R>(reader: &mut R) -> Result<Self, CodecError>
    where
        R: AsyncRead + Unpin,
    {
        Ok(Self::from_bits(wire::read_bitfield(reader, 8).await? as u8))
    }
}

/// Basic conference type, the 4-bit prefix of [`ExtendedConfType`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfType {
    pub rd_prot: bool,
    pub original: bool,
    pub secret: bool,
    pub letterbox: bool,
}

impl ConfType {
    /// Parses the 4-character wire encoding from the start of `s`.
    pub fn parse(s: &str) -> Result<Self, CodecError> {
        let bytes = s.as_bytes();
        if bytes.len() < 4 {
            return Err(CodecError::Truncated);
        }
        let mut flags = [false; 4];
        for (i, flag) in flags.iter_mut().enumerate() {
            *flag = match bytes[i] {
                b'0' => false,
                b'1' => true,
                other => return Err(CodecError::InvalidBitField(other)),
            };
        }
        Ok(Self {
            rd_prot: flags[0],
            original: flags[1],
            secret: flags[2],
            letterbox: flags[3],
        })
    }

    /// The 4-character wire encoding.
    pub fn bit_field(&self) -> String {
        let mut out = String::with_capacity(4);
        for set in [self.rd_prot, self.original, self.secret, self.letterbox] {
            out.push(if set { '1' } else { '0' });
        }
        out
    }
}

/// Either conference type, for the calls that accept both encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnyConfType {
    Basic(ConfType),
    Extended(ExtendedConfType),
}

impl AnyConfType {
    pub fn bit_field(&self) -> String {
        match self {
            AnyConfType::Basic(t) => t.bit_field(),
            AnyConfType::Extended(t) => t.bit_field(),
        }
    }
}

/// Personal flags, an 8-bit field with one defined bit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonalFlags {
    pub unread_is_secret: bool,
}

impl PersonalFlags {
    pub fn from_bits(bits: u8) -> Self {
        Self {
            unread_is_secret: bits & 0x80 != 0,
        }
    }

    pub fn bit_field(&self) -> String {
        format!("{:08b}", if self.unread_is_secret { 0x80u8 } else { 0 })
    }

    pub async fn read<R>(reader: &mut R) -> Result<Self, CodecError>
    where
        R: AsyncRead + Unpin,
    {
        Ok(Self::from_bits(wire::read_bitfield(reader, 8).await? as u8))
    }
}

/// Membership type, a 4-bit field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipType {
    pub invitation: bool,
    pub passive: bool,
    pub secret: bool,
    pub passive_message_invert: bool,
}

impl MembershipType {
    pub fn from_bits(bits: u8) -> Self {
        Self {
            invitation: bits & 0x8 != 0,
            passive: bits & 0x4 != 0,
            secret: bits & 0x2 != 0,
            passive_message_invert: bits & 0x1 != 0,
        }
    }

    pub fn bit_field(&self) -> String {
        let mut bits = 0u8;
        for (set, mask) in [
            (self.invitation, 0x8),
            (self.passive, 0x4),
            (self.secret, 0x2),
            (self.passive_message_invert, 0x1),
        ] {
            if set {
                bits |= mask;
            }
        }
        format!("{bits:04b}")
    }
}

/// Aux-item flags, an 8-bit field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuxItemFlags {
    pub deleted: bool,
    pub inherit: bool,
    pub secret: bool,
    pub hide_creator: bool,
    pub dont_garb: bool,
    pub reserved2: bool,
    pub reserved3: bool,
    pub reserved4: bool,
}

impl AuxItemFlags {
    pub fn from_bits(bits: u8) -> Self {
        Self {
            deleted: bits & 0x80 != 0,
            inherit: bits & 0x40 != 0,
            secret: bits & 0x20 != 0,
            hide_creator: bits & 0x10 != 0,
            dont_garb: bits & 0x08 != 0,
            reserved2: bits & 0x04 != 0,
            reserved3: bits & 0x02 != 0,
            reserved4: bits & 0x01 != 0,
        }
    }

    pub fn bit_field(&self) -> String {
        let mut bits = 0u8;
        for (set, mask) in [
            (self.deleted, 0x80),
            (self.inherit, 0x40),
            (self.secret, 0x20),
            (self.hide_creator, 0x10),
            (self.dont_garb, 0x08),
            (self.reserved2, 0x04),
            (self.reserved3, 0x02),
            (self.reserved4, 0x01),
        ] {
            if set {
                bits |= mask;
            }
        }
        format!("{bits:08b}")
    }
}

/// An aux-item attached to a text or conference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuxItem {
    pub aux_no: AuxNo,
    pub tag: u32,
    pub creator: ConfNo,
    pub created_at: DateTime<Utc>,
    pub flags: AuxItemFlags,
    pub inherit_limit: u32,
    pub data: String,
}

/// Recipient kind for `add-recipient`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InfoType {
    /// Plain recipient (misc-info selector 0).
    Recipient,
    /// Carbon-copy recipient (selector 1).
    CcRecipient,
    /// Blind carbon-copy recipient (selector 15).
    BccRecipient,
}

impl InfoType {
    pub fn wire_value(&self) -> u32 {
        match self {
            InfoType::Recipient => 0,
            InfoType::CcRecipient => 1,
            InfoType::BccRecipient => 15,
        }
    }
}

/// One misc-info item of a text status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MiscInfo {
    pub selector: u32,
    pub recipient: ConfNo,
    pub cc_recipient: ConfNo,
    pub comment_to: TextNo,
    pub commented_in: TextNo,
    pub footnote_to: TextNo,
    pub footnoted_in: TextNo,
    pub local_no: TextNo,
    pub sender: ConfNo,
    pub sent_at: Option<DateTime<Utc>>,
    pub received_at: Option<DateTime<Utc>>,
    pub bcc_recipient: ConfNo,
}

/// A marked text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mark {
    pub text_no: TextNo,
    pub mark_type: u8,
}

/// One record of a `lookup-z-name` or `re-z-lookup` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfZInfo {
    pub name: String,
    pub conf_type: ConfType,
    pub conf_no: ConfNo,
}

/// The abbreviated conference status of `get-uconf-stat`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UConference {
    pub name: String,
    pub conf_type: ExtendedConfType,
    pub highest_local_no: TextNo,
    pub nice: u32,
}

/// The person status of `get-person-stat`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub privileges: PrivBits,
    pub flags: PersonalFlags,
    pub last_login: DateTime<Utc>,
    pub user_area: TextNo,
    pub total_time_present: u32,
    pub sessions: u32,
    pub created_lines: u32,
    pub created_bytes: u32,
    pub read_texts: u32,
    pub text_fetches: u32,
    pub created_persons: u16,
    pub created_conferences: u16,
    pub first_created_local_no: u32,
    pub created_texts: u32,
    pub marks: u16,
    pub conferences: u16,
}

/// Server version information from `get-version-info`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    pub protocol_version: u32,
    pub server_software: String,
    pub software_version: String,
}

/// The server information block accepted by `set-info`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfoOld {
    pub version: u32,
    pub conf_pres_conf: ConfNo,
    pub pers_pres_conf: ConfNo,
    pub motd_conf: ConfNo,
    pub kom_news_conf: ConfNo,
    pub motd_of_lyskom: TextNo,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn priv_bits_round_trip() {
        let bits = PrivBits {
            wheel: true,
            admin: true,
            change_name: true,
            ..Default::default()
        };
        assert_eq!(bits.bit_field(), "1100010000000000");
        assert_eq!(PrivBits::from_bits(0b1100_0100_0000_0000), bits);
    }

    #[tokio::test]
    async fn priv_bits_read_from_stream() {
        let mut data: &[u8] = b"1100010000000000 ";
        let bits = PrivBits::read(&mut data).await.unwrap();
        assert!(bits.wheel && bits.admin && bits.change_name);
        assert!(!bits.statistic && !bits.create_persons && !bits.create_conferences);
    }

    #[test]
    fn extended_conf_type_round_trip() {
        let t = ExtendedConfType {
            allow_anonymous: true,
            ..Default::default()
        };
        assert_eq!(t.bit_field(), "00001000");
        assert_eq!(ExtendedConfType::from_bits(0b0000_1000), t);

        let all = ExtendedConfType {
            rd_prot: true,
            original: true,
            secret: true,
            letterbox: true,
            allow_anonymous: true,
            forbid_secret: true,
            reserved2: true,
            reserved3: true,
        };
        assert_eq!(ExtendedConfType::from_bits(0xff), all);
        assert_eq!(all.bit_field(), "11111111");
    }

    #[test]
    fn conf_type_parse_and_encode() {
        let letterbox = ConfType::parse("1001").unwrap();
        assert!(letterbox.rd_prot && letterbox.letterbox);
        assert!(!letterbox.original && !letterbox.secret);
        assert_eq!(letterbox.bit_field(), "1001");

        assert_eq!(ConfType::parse("0000").unwrap(), ConfType::default());
        assert!(matches!(ConfType::parse("01"), Err(CodecError::Truncated)));
        assert!(matches!(
            ConfType::parse("01x0"),
            Err(CodecError::InvalidBitField(b'x'))
        ));
    }

    #[test]
    fn any_conf_type_picks_the_right_width() {
        assert_eq!(AnyConfType::Basic(ConfType::default()).bit_field(), "0000");
        assert_eq!(
            AnyConfType::Extended(ExtendedConfType::default()).bit_field(),
            "00000000"
        );
    }

    #[test]
    fn personal_flags_msb() {
        assert!(PersonalFlags::from_bits(0x80).unread_is_secret);
        assert!(!PersonalFlags::from_bits(0x01).unread_is_secret);
        assert_eq!(
            PersonalFlags {
                unread_is_secret: true
            }
            .bit_field(),
            "10000000"
        );
    }

    #[test]
    fn membership_type_round_trip() {
        let t = MembershipType {
            invitation: true,
            secret: true,
            ..Default::default()
        };
        assert_eq!(t.bit_field(), "1010");
        assert_eq!(MembershipType::from_bits(0b1010), t);
    }

    #[test]
    fn aux_item_flags_round_trip() {
        let f = AuxItemFlags {
            inherit: true,
            dont_garb: true,
            ..Default::default()
        };
        assert_eq!(f.bit_field(), "01001000");
        assert_eq!(AuxItemFlags::from_bits(0b0100_1000), f);
    }

    #[test]
    fn info_type_wire_values() {
        assert_eq!(InfoType::Recipient.wire_value(), 0);
        assert_eq!(InfoType::CcRecipient.wire_value(), 1);
        assert_eq!(InfoType::BccRecipient.wire_value(), 15);
    }

    #[test]
    fn data_carriers_serialize() {
        let conf = ConfZInfo {
            name: "Test Conference".into(),
            conf_type: ConfType::default(),
            conf_no: 10,
        };
        let json = serde_json::to_string(&conf).unwrap();
        let back: ConfZInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(back, conf);

        let item = AuxItem {
            aux_no: 1,
            tag: 1,
            creator: 5,
            created_at: chrono::Utc.with_ymd_and_hms(1999, 1, 1, 0, 0, 0).unwrap(),
            flags: AuxItemFlags::default(),
            inherit_limit: 0,
            data: "content-type".into(),
        };
        let json = serde_json::to_string(&item).unwrap();
        let back: AuxItem = serde_json::from_str(&json).unwrap();
        assert_eq!(back, item);

        let misc = MiscInfo {
            selector: 0,
            recipient: 14,
            cc_recipient: 0,
            comment_to: 0,
            commented_in: 0,
            footnote_to: 0,
            footnoted_in: 0,
            local_no: 33,
            sender: 0,
            sent_at: None,
            received_at: Some(chrono::Utc.with_ymd_and_hms(1999, 1, 1, 0, 0, 0).unwrap()),
            bcc_recipient: 0,
        };
        let json = serde_json::to_string(&misc).unwrap();
        let back: MiscInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(back, misc);
    }
}
