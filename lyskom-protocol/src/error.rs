//! Codec errors and the Protocol A server error taxonomy.

use thiserror::Error;

/// Failures while encoding or decoding the wire grammar.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unexpected length character 0x{0:02x}")]
    UnexpectedLengthCharacter(u8),

    #[error("string length {0} exceeds the payload limit")]
    OversizeString(u64),

    #[error("expected list delimiter {expected:?}, found 0x{found:02x}")]
    UnexpectedDelimiter { expected: char, found: u8 },

    #[error("invalid bit-field character 0x{0:02x}")]
    InvalidBitField(u8),

    #[error("array advertised {expected} items, found {found}")]
    ArrayLength { expected: usize, found: usize },

    #[error("invalid integer token {0:?}")]
    InvalidInteger(String),

    #[error("time tuple does not denote a valid instant")]
    InvalidTime,

    #[error("scan ran past the end of the buffer")]
    Truncated,
}

impl CodecError {
    /// True when the underlying byte stream can no longer be trusted to be
    /// frame-aligned (as opposed to a bad value inside an intact frame).
    pub fn is_io(&self) -> bool {
        matches!(self, CodecError::Io(_))
    }
}

/// An error reported by the server as a `%` response.
///
/// Protocol A transmits these as a `(code, status)` pair of 32-bit unsigned
/// integers. The status is only meaningful for some codes; where it is, the
/// variant carries it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ServerError {
    #[error("the server reported 'no error' as an error (status {0})")]
    NoError(u32),
    #[error("call not implemented")]
    NotImplemented,
    #[error("call is obsolete")]
    ObsoleteCall,
    #[error("invalid password")]
    InvalidPassword,
    #[error("string too long, maximum length is {0}")]
    StringTooLong(u32),
    #[error("login required")]
    LoginFirst,
    #[error("single-user mode, login not allowed")]
    LoginDisallowed,
    #[error("conference number zero is not valid")]
    ConferenceZero,
    #[error("conference {0} does not exist or is secret")]
    UndefinedConference(u32),
    #[error("person {0} does not exist or is secret")]
    UndefinedPerson(u32),
    #[error("access to object {0} denied")]
    AccessDenied(u32),
    #[error("permission denied operating on object {0}")]
    PermissionDenied(u32),
    #[error("membership in conference {0} required")]
    NotMember(u32),
    #[error("text {0} does not exist or is secret")]
    NoSuchText(u32),
    #[error("text number zero is not valid")]
    TextZero,
    #[error("local text number {0} does not exist")]
    NoSuchLocalText(u32),
    #[error("local text number zero is not valid")]
    LocalTextZero,
    #[error("bad name")]
    BadName,
    #[error("index out of range (status {0})")]
    IndexOutOfRange(u32),
    #[error("conference name already exists")]
    ConferenceExists,
    #[error("person name already exists")]
    PersonExists,
    #[error("secret conferences must be read-protected")]
    SecretPublic,
    #[error("cannot change the letterbox flag of conference {0}")]
    Letterbox(u32),
    #[error("server database is corrupted (internal code {0})")]
    LdbError(u32),
    #[error("illegal misc item at index {0}")]
    IllegalMisc(u32),
    #[error("unknown misc-info type {0}")]
    IllegalInfoType(u32),
    #[error("conference {0} is already a recipient")]
    AlreadyRecipient(u32),
    #[error("text {0} is already a comment")]
    AlreadyComment(u32),
    #[error("text {0} is already a footnote")]
    AlreadyFootnote(u32),
    #[error("conference {0} is not a recipient")]
    NotRecipient(u32),
    #[error("text {0} is not a comment")]
    NotComment(u32),
    #[error("text {0} is not a footnote")]
    NotFootnote(u32),
    #[error("text {0} already has the maximum number of recipients")]
    RecipientLimit(u32),
    #[error("text {0} already has the maximum number of comments")]
    CommentLimit(u32),
    #[error("text {0} already has the maximum number of footnotes")]
    FootnoteLimit(u32),
    #[error("text {0} already has the maximum number of marks")]
    MarkLimit(u32),
    #[error("not the author of text {0}")]
    NotAuthor(u32),
    #[error("unable to connect")]
    NoConnect,
    #[error("server is out of memory")]
    OutOfMemory,
    #[error("server is crazy")]
    ServerIsCrazy,
    #[error("illegal call sequence")]
    ClientIsCrazy,
    #[error("session {0} does not exist")]
    UndefinedSession(u32),
    #[error("invalid or uncompilable regular expression")]
    RegexpError,
    #[error("text {0} is not marked")]
    NotMarked(u32),
    #[error("temporary failure, try again later")]
    TemporaryFailure,
    #[error("array too long")]
    LongArray,
    #[error("recipient does not accept anonymous texts")]
    AnonymousRejected,
    #[error("illegal aux-item at index {0}")]
    IllegalAuxItem(u32),
    #[error("not enough permissions for aux-item at index {0}")]
    AuxItemPermission(u32),
    #[error("server does not send asynchronous message {0}")]
    UnknownAsync(u32),
    #[error("recoverable internal server error")]
    InternalError,
    #[error("feature disabled in this server")]
    FeatureDisabled,
    #[error("asynchronous message could not be sent")]
    MessageNotSent,
    #[error("membership type not compatible with server or conference restrictions")]
    InvalidMembershipType,
    #[error("range lower limit exceeds upper limit")]
    InvalidRange,
    #[error("range list is not strictly ascending")]
    InvalidRangeList,
    #[error("server does not make that measurement")]
    UndefinedMeasurement,
    #[error("lowest priority you may set is {0}")]
    PriorityDenied(u32),
    #[error("not enough privileges to set that scheduling weight")]
    WeightDenied,
    #[error("scheduling weight must be non-zero")]
    WeightZero,
    #[error("BOOL argument must be 0 or 1")]
    BadBool,
    #[error("server error, code {code}, status {status}")]
    Generic { code: u32, status: u32 },
}

impl ServerError {
    /// Maps a wire-level `(code, status)` pair to a structured error.
    /// Codes the taxonomy does not know fall through to [`ServerError::Generic`].
    pub fn from_wire(code: u32, status: u32) -> Self {
        match code {
            0 => ServerError::NoError(status),
            2 => ServerError::NotImplemented,
            3 => ServerError::ObsoleteCall,
            4 => ServerError::InvalidPassword,
            5 => ServerError::StringTooLong(status),
            6 => ServerError::LoginFirst,
            7 => ServerError::LoginDisallowed,
            8 => ServerError::ConferenceZero,
            9 => ServerError::UndefinedConference(status),
            10 => ServerError::UndefinedPerson(status),
            11 => ServerError::AccessDenied(status),
            12 => ServerError::PermissionDenied(status),
            13 => ServerError::NotMember(status),
            14 => ServerError::NoSuchText(status),
            15 => ServerError::TextZero,
            16 => ServerError::NoSuchLocalText(status),
            17 => ServerError::LocalTextZero,
            18 => ServerError::BadName,
            19 => ServerError::IndexOutOfRange(status),
            20 => ServerError::ConferenceExists,
            21 => ServerError::PersonExists,
            22 => ServerError::SecretPublic,
            23 => ServerError::Letterbox(status),
            24 => ServerError::LdbError(status),
            25 => ServerError::IllegalMisc(status),
            26 => ServerError::IllegalInfoType(status),
            27 => ServerError::AlreadyRecipient(status),
            28 => ServerError::AlreadyComment(status),
            29 => ServerError::AlreadyFootnote(status),
            30 => ServerError::NotRecipient(status),
            31 => ServerError::NotComment(status),
            32 => ServerError::NotFootnote(status),
            33 => ServerError::RecipientLimit(status),
            34 => ServerError::CommentLimit(status),
            35 => ServerError::FootnoteLimit(status),
            36 => ServerError::MarkLimit(status),
            37 => ServerError::NotAuthor(status),
            38 => ServerError::NoConnect,
            39 => ServerError::OutOfMemory,
            40 => ServerError::ServerIsCrazy,
            41 => ServerError::ClientIsCrazy,
            42 => ServerError::UndefinedSession(status),
            43 => ServerError::RegexpError,
            44 => ServerError::NotMarked(status),
            45 => ServerError::TemporaryFailure,
            46 => ServerError::LongArray,
            47 => ServerError::AnonymousRejected,
            48 => ServerError::IllegalAuxItem(status),
            49 => ServerError::AuxItemPermission(status),
            50 => ServerError::UnknownAsync(status),
            51 => ServerError::InternalError,
            52 => ServerError::FeatureDisabled,
            53 => ServerError::MessageNotSent,
            54 => ServerError::InvalidMembershipType,
            55 => ServerError::InvalidRange,
            56 => ServerError::InvalidRangeList,
            57 => ServerError::UndefinedMeasurement,
            58 => ServerError::PriorityDenied(status),
            59 => ServerError::WeightDenied,
            60 => ServerError::WeightZero,
            61 => ServerError::BadBool,
            _ => ServerError::Generic { code, status },
        }
    }

    /// The numeric Protocol A error code this variant corresponds to.
    pub fn code(&self) -> u32 {
        match self {
            ServerError::NoError(_) => 0,
            ServerError::NotImplemented => 2,
            ServerError::ObsoleteCall => 3,
            ServerError::InvalidPassword => 4,
            ServerError::StringTooLong(_) => 5,
            ServerError::LoginFirst => 6,
            ServerError::LoginDisallowed => 7,
            ServerError::ConferenceZero => 8,
            ServerError::UndefinedConference(_) => 9,
            ServerError::UndefinedPerson(_) => 10,
            ServerError::AccessDenied(_) => 11,
            ServerError::PermissionDenied(_) => 12,
            ServerError::NotMember(_) => 13,
            ServerError::NoSuchText(_) => 14,
            ServerError::TextZero => 15,
            ServerError::NoSuchLocalText(_) => 16,
            ServerError::LocalTextZero => 17,
            ServerError::BadName => 18,
            ServerError::IndexOutOfRange(_) => 19,
            ServerError::ConferenceExists => 20,
            ServerError::PersonExists => 21,
            ServerError::SecretPublic => 22,
            ServerError::Letterbox(_) => 23,
            ServerError::LdbError(_) => 24,
            ServerError::IllegalMisc(_) => 25,
            ServerError::IllegalInfoType(_) => 26,
            ServerError::AlreadyRecipient(_) => 27,
            ServerError::AlreadyComment(_) => 28,
            ServerError::AlreadyFootnote(_) => 29,
            ServerError::NotRecipient(_) => 30,
            ServerError::NotComment(_) => 31,
            ServerError::NotFootnote(_) => 32,
            ServerError::RecipientLimit(_) => 33,
            ServerError::CommentLimit(_) => 34,
            ServerError::FootnoteLimit(_) => 35,
            ServerError::MarkLimit(_) => 36,
            ServerError::NotAuthor(_) => 37,
            ServerError::NoConnect => 38,
            ServerError::OutOfMemory => 39,
            ServerError::ServerIsCrazy => 40,
            ServerError::ClientIsCrazy => 41,
            ServerError::UndefinedSession(_) => 42,
            ServerError::RegexpError => 43,
            ServerError::NotMarked(_) => 44,
            ServerError::TemporaryFailure => 45,
            ServerError::LongArray => 46,
            ServerError::AnonymousRejected => 47,
            ServerError::IllegalAuxItem(_) => 48,
            ServerError::AuxItemPermission(_) => 49,
            ServerError::UnknownAsync(_) => 50,
            ServerError::InternalError => 51,
            ServerError::FeatureDisabled => 52,
            ServerError::MessageNotSent => 53,
            ServerError::InvalidMembershipType => 54,
            ServerError::InvalidRange => 55,
            ServerError::InvalidRangeList => 56,
            ServerError::UndefinedMeasurement => 57,
            ServerError::PriorityDenied(_) => 58,
            ServerError::WeightDenied => 59,
            ServerError::WeightZero => 60,
            ServerError::BadBool => 61,
            ServerError::Generic { code, .. } => *code,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_wire_maps_known_codes() {
        assert_eq!(ServerError::from_wire(2, 3), ServerError::NotImplemented);
        assert_eq!(ServerError::from_wire(14, 4711), ServerError::NoSuchText(4711));
        assert_eq!(ServerError::from_wire(5, 80), ServerError::StringTooLong(80));
        assert_eq!(
            ServerError::from_wire(12, 6),
            ServerError::PermissionDenied(6)
        );
        assert_eq!(ServerError::from_wire(61, 0), ServerError::BadBool);
    }

    #[test]
    fn from_wire_falls_through_on_unknown_codes() {
        assert_eq!(
            ServerError::from_wire(99, 7),
            ServerError::Generic { code: 99, status: 7 }
        );
        // Code 1 is not assigned by the protocol.
        assert_eq!(
            ServerError::from_wire(1, 0),
            ServerError::Generic { code: 1, status: 0 }
        );
    }

    #[test]
    fn status_is_embedded_in_messages() {
        assert_eq!(
            ServerError::NoSuchText(13020).to_string(),
            "text 13020 does not exist or is secret"
        );
        assert_eq!(
            ServerError::StringTooLong(255).to_string(),
            "string too long, maximum length is 255"
        );
        let generic = ServerError::Generic { code: 77, status: 3 };
        assert_eq!(generic.to_string(), "server error, code 77, status 3");
    }

    #[test]
    fn code_round_trips() {
        for code in 0..=61u32 {
            let err = ServerError::from_wire(code, 42);
            assert_eq!(err.code(), code);
        }
    }

    #[test]
    fn io_errors_are_stream_fatal() {
        let io = CodecError::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "eof",
        ));
        assert!(io.is_io());
        assert!(!CodecError::InvalidTime.is_io());
    }
}
