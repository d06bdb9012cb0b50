//! DCC control-message grammar.
//!
//! Payloads are space-delimited: `<VERB> <args...>`, with verbs CHAT, SEND,
//! RESUME and ACCEPT (case-sensitive). [`ControlMessage::parse`] accepts an
//! optional leading `DCC ` tag; [`std::fmt::Display`] renders the canonical
//! tagged payload ready to hand to the chat transport.

use std::fmt;

use crate::ProtocolError;

/// A parsed DCC control payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlMessage {
    /// `DCC CHAT chat <wireIP> <port>` — the peer offers a direct chat.
    Chat { wire_ip: String, port: u16 },

    /// `DCC SEND <filename> <wireIP> <port> <fileSize>` — the peer offers a file.
    Send {
        file_name: String,
        wire_ip: String,
        port: u16,
        file_size: u64,
    },

    /// `DCC RESUME <port> [<filename>] <offset>` — the receiver asks to
    /// continue a partially transferred file.
    Resume {
        port: u16,
        file_name: Option<String>,
        offset: u64,
    },

    /// `DCC ACCEPT <port> [<filename>] <offset>` — the sender grants a RESUME.
    Accept {
        port: u16,
        file_name: Option<String>,
        offset: u64,
    },
}

impl ControlMessage {
    /// Parses a control payload.
    ///
    /// Filenames may contain spaces: for SEND everything between the verb
    /// and the last three operands is the filename, for RESUME/ACCEPT
    /// everything between the port and the offset.
    pub fn parse(payload: &str) -> Result<Self, ProtocolError> {
        let payload = payload.strip_prefix("DCC ").unwrap_or(payload).trim();
        let tokens: Vec<&str> = payload.split_whitespace().collect();
        let Some((&verb, args)) = tokens.split_first() else {
            return Err(ProtocolError::UnknownVerb(String::new()));
        };

        match verb {
            "CHAT" => {
                // The medium token is literal "chat"; anything else is a
                // DCC extension we do not speak.
                match args {
                    ["chat", wire_ip, port] => Ok(Self::Chat {
                        wire_ip: (*wire_ip).to_string(),
                        port: parse_number(port, "port")?,
                    }),
                    ["chat", ..] => Err(ProtocolError::MissingArgument("CHAT")),
                    [medium, ..] => Err(ProtocolError::UnknownVerb(format!("CHAT {medium}"))),
                    [] => Err(ProtocolError::MissingArgument("CHAT")),
                }
            }
            "SEND" => {
                if args.len() < 4 {
                    return Err(ProtocolError::MissingArgument("SEND"));
                }
                let file_name = args[..args.len() - 3].join(" ");
                let wire_ip = args[args.len() - 3].to_string();
                let port = parse_number(args[args.len() - 2], "port")?;
                let file_size = parse_number(args[args.len() - 1], "file size")?;
                Ok(Self::Send {
                    file_name,
                    wire_ip,
                    port,
                    file_size,
                })
            }
            "RESUME" | "ACCEPT" => {
                if args.len() < 2 {
                    return Err(ProtocolError::MissingArgument(if verb == "RESUME" {
                        "RESUME"
                    } else {
                        "ACCEPT"
                    }));
                }
                let port = parse_number(args[0], "port")?;
                let offset = parse_number(args[args.len() - 1], "offset")?;
                let file_name = if args.len() > 2 {
                    Some(args[1..args.len() - 1].join(" "))
                } else {
                    None
                };
                if verb == "RESUME" {
                    Ok(Self::Resume {
                        port,
                        file_name,
                        offset,
                    })
                } else {
                    Ok(Self::Accept {
                        port,
                        file_name,
                        offset,
                    })
                }
            }
            other => Err(ProtocolError::UnknownVerb(other.to_string())),
        }
    }
}

fn parse_number<T: std::str::FromStr>(value: &str, field: &'static str) -> Result<T, ProtocolError> {
    value.parse().map_err(|_| ProtocolError::InvalidNumber {
        field,
        value: value.to_string(),
    })
}

impl fmt::Display for ControlMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Chat { wire_ip, port } => write!(f, "DCC CHAT chat {wire_ip} {port}"),
            Self::Send {
                file_name,
                wire_ip,
                port,
                file_size,
            } => write!(f, "DCC SEND {file_name} {wire_ip} {port} {file_size}"),
            Self::Resume {
                port,
                file_name,
                offset,
            } => match file_name {
                Some(name) => write!(f, "DCC RESUME {port} {name} {offset}"),
                None => write!(f, "DCC RESUME {port} {offset}"),
            },
            Self::Accept {
                port,
                file_name,
                offset,
            } => match file_name {
                Some(name) => write!(f, "DCC ACCEPT {port} {name} {offset}"),
                None => write!(f, "DCC ACCEPT {port} {offset}"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_chat() {
        let msg = ControlMessage::parse("CHAT chat 2130706433 5000").unwrap();
        assert_eq!(
            msg,
            ControlMessage::Chat {
                wire_ip: "2130706433".into(),
                port: 5000,
            }
        );
    }

    #[test]
    fn parse_send() {
        let msg = ControlMessage::parse("SEND notes.txt 2130706433 5000 2048").unwrap();
        assert_eq!(
            msg,
            ControlMessage::Send {
                file_name: "notes.txt".into(),
                wire_ip: "2130706433".into(),
                port: 5000,
                file_size: 2048,
            }
        );
    }

    #[test]
    fn parse_send_filename_with_spaces() {
        let msg = ControlMessage::parse("SEND my holiday photos.zip 2130706433 5000 99").unwrap();
        assert_eq!(
            msg,
            ControlMessage::Send {
                file_name: "my holiday photos.zip".into(),
                wire_ip: "2130706433".into(),
                port: 5000,
                file_size: 99,
            }
        );
    }

    #[test]
    fn parse_resume_with_and_without_filename() {
        assert_eq!(
            ControlMessage::parse("RESUME 5000 800").unwrap(),
            ControlMessage::Resume {
                port: 5000,
                file_name: None,
                offset: 800,
            }
        );
        assert_eq!(
            ControlMessage::parse("RESUME 5000 notes.txt 800").unwrap(),
            ControlMessage::Resume {
                port: 5000,
                file_name: Some("notes.txt".into()),
                offset: 800,
            }
        );
    }

    #[test]
    fn parse_accept() {
        assert_eq!(
            ControlMessage::parse("ACCEPT 5000 my file.bin 1200").unwrap(),
            ControlMessage::Accept {
                port: 5000,
                file_name: Some("my file.bin".into()),
                offset: 1200,
            }
        );
    }

    #[test]
    fn parse_strips_dcc_tag() {
        assert!(ControlMessage::parse("DCC CHAT chat 1 2").is_ok());
        assert!(ControlMessage::parse("CHAT chat 1 2").is_ok());
    }

    #[test]
    fn verbs_are_case_sensitive() {
        assert!(ControlMessage::parse("send notes.txt 1 2 3").is_err());
        assert!(ControlMessage::parse("Chat chat 1 2").is_err());
    }

    #[test]
    fn unknown_verb_rejected() {
        assert!(matches!(
            ControlMessage::parse("XMIT notes.txt 1 2 3"),
            Err(ProtocolError::UnknownVerb(_))
        ));
        assert!(matches!(
            ControlMessage::parse("CHAT video 1 2"),
            Err(ProtocolError::UnknownVerb(_))
        ));
        assert!(ControlMessage::parse("").is_err());
    }

    #[test]
    fn malformed_numbers_are_errors_not_panics() {
        assert!(matches!(
            ControlMessage::parse("CHAT chat 2130706433 notaport"),
            Err(ProtocolError::InvalidNumber { field: "port", .. })
        ));
        assert!(matches!(
            ControlMessage::parse("SEND f.bin 2130706433 5000 huge"),
            Err(ProtocolError::InvalidNumber { .. })
        ));
        assert!(ControlMessage::parse("RESUME notaport 800").is_err());
        assert!(ControlMessage::parse("SEND f.bin 2130706433 70000 1").is_err());
    }

    #[test]
    fn missing_arguments_rejected() {
        assert!(ControlMessage::parse("CHAT chat 2130706433").is_err());
        assert!(ControlMessage::parse("SEND f.bin 2130706433 5000").is_err());
        assert!(ControlMessage::parse("RESUME 5000").is_err());
    }

    #[test]
    fn render_roundtrip() {
        let messages = [
            ControlMessage::Chat {
                wire_ip: "2130706433".into(),
                port: 5000,
            },
            ControlMessage::Send {
                file_name: "a b.bin".into(),
                wire_ip: "16909060".into(),
                port: 1024,
                file_size: 1_000_000,
            },
            ControlMessage::Resume {
                port: 5000,
                file_name: Some("a b.bin".into()),
                offset: 800,
            },
            ControlMessage::Accept {
                port: 5000,
                file_name: None,
                offset: 800,
            },
        ];
        for msg in messages {
            assert_eq!(ControlMessage::parse(&msg.to_string()).unwrap(), msg);
        }
    }
}
