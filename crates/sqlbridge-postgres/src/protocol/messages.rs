//! PostgreSQL frontend and backend message definitions.

use super::backend_type;
use super::reader::MessageReader;
use sqlbridge_core::Result;
use sqlbridge_core::error::protocol_error;

/// Messages sent from client to server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrontendMessage {
    /// Startup message carrying protocol version and session parameters
    Startup {
        version: i32,
        params: Vec<(String, String)>,
    },
    /// Password response (cleartext or MD5-hashed)
    Password(String),
    /// Simple query
    Query(String),
    /// Graceful session termination
    Terminate,
}

/// Authentication request sub-types carried in an `'R'` message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthRequest {
    /// Authentication complete (sub-type 0)
    Ok,
    /// Server wants the password in cleartext (sub-type 3)
    CleartextPassword,
    /// Server wants an MD5-hashed password with this salt (sub-type 5)
    Md5Password { salt: [u8; 4] },
    /// Any other mechanism; the native path cannot satisfy it
    Other(i32),
}

/// Fields of an ErrorResponse or NoticeResponse.
///
/// The wire form is a sequence of `tag byte + NUL-terminated text` pairs
/// ending with a zero byte. Tags are kept verbatim so nothing the server
/// said is lost.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorFields {
    fields: Vec<(u8, String)>,
}

impl ErrorFields {
    /// Parse the fields from an `'E'` or `'N'` payload.
    pub fn parse(payload: &[u8]) -> Self {
        let mut reader = MessageReader::new(payload);
        let mut fields = Vec::new();
        while let Some(tag) = reader.read_u8() {
            if tag == 0 {
                break;
            }
            let text = reader.read_cstr().unwrap_or_default();
            fields.push((tag, text));
        }
        Self { fields }
    }

    /// Get the text of a field by its tag.
    pub fn get(&self, tag: u8) -> Option<&str> {
        self.fields
            .iter()
            .find(|(t, _)| *t == tag)
            .map(|(_, text)| text.as_str())
    }

    /// Severity (`S` field).
    pub fn severity(&self) -> Option<&str> {
        self.get(b'S')
    }

    /// SQLSTATE code (`C` field).
    pub fn code(&self) -> Option<&str> {
        self.get(b'C')
    }

    /// Human-readable message.
    ///
    /// Prefers the primary `M` field; when a server omits it, concatenates
    /// every field so the text is never empty for a non-empty response.
    pub fn message(&self) -> String {
        if let Some(m) = self.get(b'M') {
            return m.to_string();
        }
        self.fields
            .iter()
            .map(|(tag, text)| format!("{}={}", *tag as char, text))
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Check if no fields were present.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Messages received from the server, parsed from `(tag, payload)` frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendMessage {
    /// Authentication request or completion
    Authentication(AuthRequest),
    /// Error from the server
    ErrorResponse(ErrorFields),
    /// Informational notice
    NoticeResponse(ErrorFields),
    /// Runtime parameter report during startup
    ParameterStatus { name: String, value: String },
    /// Cancellation key data (unused, retained for protocol completeness)
    BackendKeyData { process_id: i32, secret_key: i32 },
    /// Server is ready for the next query; `status` is the transaction byte
    ReadyForQuery { status: u8 },
    /// Column list for the rows that follow
    RowDescription { columns: Vec<String> },
    /// One row of cells; `None` marks SQL NULL
    DataRow { cells: Vec<Option<Vec<u8>>> },
    /// Statement finished; the command tag is not interpreted
    CommandComplete { tag: String },
    /// The query string was empty
    EmptyQueryResponse,
    /// Any message type this client does not interpret
    Unknown { tag: u8 },
}

impl BackendMessage {
    /// Parse a backend message from its frame tag and payload.
    #[allow(clippy::result_large_err)]
    pub fn parse(tag: u8, payload: &[u8]) -> Result<Self> {
        let mut reader = MessageReader::new(payload);
        match tag {
            backend_type::AUTHENTICATION => {
                let sub_type = reader
                    .read_i32()
                    .ok_or_else(|| protocol_error("Authentication message missing sub-type"))?;
                let request = match sub_type {
                    0 => AuthRequest::Ok,
                    3 => AuthRequest::CleartextPassword,
                    5 => {
                        let bytes = reader.read_bytes(4).ok_or_else(|| {
                            protocol_error("MD5 authentication request missing salt")
                        })?;
                        let mut salt = [0u8; 4];
                        salt.copy_from_slice(bytes);
                        AuthRequest::Md5Password { salt }
                    }
                    other => AuthRequest::Other(other),
                };
                Ok(BackendMessage::Authentication(request))
            }
            backend_type::ERROR_RESPONSE => {
                Ok(BackendMessage::ErrorResponse(ErrorFields::parse(payload)))
            }
            backend_type::NOTICE_RESPONSE => {
                Ok(BackendMessage::NoticeResponse(ErrorFields::parse(payload)))
            }
            backend_type::PARAMETER_STATUS => {
                let name = reader
                    .read_cstr()
                    .ok_or_else(|| protocol_error("ParameterStatus missing name"))?;
                let value = reader.read_cstr().unwrap_or_default();
                Ok(BackendMessage::ParameterStatus { name, value })
            }
            backend_type::BACKEND_KEY_DATA => {
                let process_id = reader
                    .read_i32()
                    .ok_or_else(|| protocol_error("BackendKeyData missing process id"))?;
                let secret_key = reader
                    .read_i32()
                    .ok_or_else(|| protocol_error("BackendKeyData missing secret key"))?;
                Ok(BackendMessage::BackendKeyData {
                    process_id,
                    secret_key,
                })
            }
            backend_type::READY_FOR_QUERY => {
                let status = reader.read_u8().unwrap_or(b'I');
                Ok(BackendMessage::ReadyForQuery { status })
            }
            backend_type::ROW_DESCRIPTION => Self::parse_row_description(&mut reader),
            backend_type::DATA_ROW => Self::parse_data_row(&mut reader),
            backend_type::COMMAND_COMPLETE => {
                let tag = reader.read_cstr().unwrap_or_default();
                Ok(BackendMessage::CommandComplete { tag })
            }
            backend_type::EMPTY_QUERY_RESPONSE => Ok(BackendMessage::EmptyQueryResponse),
            other => Ok(BackendMessage::Unknown { tag: other }),
        }
    }

    #[allow(clippy::result_large_err)]
    fn parse_row_description(reader: &mut MessageReader<'_>) -> Result<Self> {
        let count = reader
            .read_i16()
            .ok_or_else(|| protocol_error("RowDescription missing column count"))?;
        let count = usize::try_from(count)
            .map_err(|_| protocol_error(format!("Invalid column count: {}", count)))?;

        let mut columns = Vec::with_capacity(count);
        for _ in 0..count {
            let name = reader
                .read_cstr()
                .ok_or_else(|| protocol_error("RowDescription truncated in column name"))?;
            // Table oid(4) + attribute(2) + type oid(4) + type size(2) +
            // type modifier(4) + format code(2). None of it is needed for
            // text results.
            if !reader.skip(18) {
                return Err(protocol_error("RowDescription truncated in column metadata"));
            }
            columns.push(name);
        }
        Ok(BackendMessage::RowDescription { columns })
    }

    #[allow(clippy::result_large_err)]
    fn parse_data_row(reader: &mut MessageReader<'_>) -> Result<Self> {
        let count = reader
            .read_i16()
            .ok_or_else(|| protocol_error("DataRow missing cell count"))?;
        let count = usize::try_from(count)
            .map_err(|_| protocol_error(format!("Invalid cell count: {}", count)))?;

        let mut cells = Vec::with_capacity(count);
        for _ in 0..count {
            let len = reader
                .read_i32()
                .ok_or_else(|| protocol_error("DataRow truncated in cell length"))?;
            if len == -1 {
                cells.push(None);
                continue;
            }
            let len = usize::try_from(len)
                .map_err(|_| protocol_error(format!("Invalid cell length: {}", len)))?;
            let bytes = reader
                .read_bytes(len)
                .ok_or_else(|| protocol_error("DataRow truncated in cell data"))?;
            cells.push(Some(bytes.to_vec()));
        }
        Ok(BackendMessage::DataRow { cells })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_auth_requests() {
        let ok = BackendMessage::parse(b'R', &[0, 0, 0, 0]).unwrap();
        assert_eq!(ok, BackendMessage::Authentication(AuthRequest::Ok));

        let cleartext = BackendMessage::parse(b'R', &[0, 0, 0, 3]).unwrap();
        assert_eq!(cleartext, BackendMessage::Authentication(AuthRequest::CleartextPassword));

        let md5 = BackendMessage::parse(b'R', &[0, 0, 0, 5, 0xDE, 0xAD, 0xBE, 0xEF]).unwrap();
        assert_eq!(
            md5,
            BackendMessage::Authentication(AuthRequest::Md5Password {
                salt: [0xDE, 0xAD, 0xBE, 0xEF]
            })
        );

        // SASL (sub-type 10) is not spoken natively.
        let sasl = BackendMessage::parse(b'R', &[0, 0, 0, 10]).unwrap();
        assert_eq!(sasl, BackendMessage::Authentication(AuthRequest::Other(10)));
    }

    #[test]
    fn test_parse_md5_without_salt_fails() {
        assert!(BackendMessage::parse(b'R', &[0, 0, 0, 5]).is_err());
    }

    #[test]
    fn test_parse_error_fields() {
        let mut payload = Vec::new();
        payload.extend_from_slice(b"SERROR\0");
        payload.extend_from_slice(b"C42P01\0");
        payload.extend_from_slice(b"Mrelation \"missing\" does not exist\0");
        payload.push(0);

        let msg = BackendMessage::parse(b'E', &payload).unwrap();
        let BackendMessage::ErrorResponse(fields) = msg else {
            panic!("expected ErrorResponse");
        };
        assert_eq!(fields.severity(), Some("ERROR"));
        assert_eq!(fields.code(), Some("42P01"));
        assert_eq!(fields.message(), "relation \"missing\" does not exist");
    }

    #[test]
    fn test_error_fields_without_message_concatenates() {
        let fields = ErrorFields::parse(b"SFATAL\0C28P01\0\0");
        assert_eq!(fields.message(), "S=FATAL; C=28P01");
    }

    #[test]
    fn test_parse_row_description() {
        let mut payload = Vec::new();
        payload.extend_from_slice(&2i16.to_be_bytes());
        for name in ["id", "name"] {
            payload.extend_from_slice(name.as_bytes());
            payload.push(0);
            payload.extend_from_slice(&[0u8; 18]);
        }

        let msg = BackendMessage::parse(b'T', &payload).unwrap();
        assert_eq!(
            msg,
            BackendMessage::RowDescription {
                columns: vec!["id".to_string(), "name".to_string()]
            }
        );
    }

    #[test]
    fn test_parse_row_description_truncated() {
        let mut payload = Vec::new();
        payload.extend_from_slice(&1i16.to_be_bytes());
        payload.extend_from_slice(b"id\0");
        payload.extend_from_slice(&[0u8; 10]); // metadata cut short

        assert!(BackendMessage::parse(b'T', &payload).is_err());
    }

    #[test]
    fn test_parse_data_row_with_null() {
        let mut payload = Vec::new();
        payload.extend_from_slice(&3i16.to_be_bytes());
        payload.extend_from_slice(&2i32.to_be_bytes());
        payload.extend_from_slice(b"42");
        payload.extend_from_slice(&(-1i32).to_be_bytes());
        payload.extend_from_slice(&0i32.to_be_bytes());

        let msg = BackendMessage::parse(b'D', &payload).unwrap();
        assert_eq!(
            msg,
            BackendMessage::DataRow {
                cells: vec![Some(b"42".to_vec()), None, Some(Vec::new())]
            }
        );
    }

    #[test]
    fn test_unknown_tag_is_skippable() {
        let msg = BackendMessage::parse(b'v', &[1, 2, 3]).unwrap();
        assert_eq!(msg, BackendMessage::Unknown { tag: b'v' });
    }
}
