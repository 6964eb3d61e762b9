//! Wire protocol shared between the relay server and game clients.
//!
//! Every datagram is a single UTF-8 text message: comma-separated fields,
//! first field the case-sensitive command tag. Identifiers travel as
//! hyphenated UUID text; positions and rotation matrix entries travel as
//! decimal text and are relayed as opaque strings, never parsed to numbers.
//! There is no length prefix, no checksum, and no escaping of the delimiter
//! inside fields (a field value containing `,` corrupts the message).

use thiserror::Error;
use uuid::Uuid;

/// Field separator used by every message on the wire.
pub const DELIMITER: char = ',';

/// Texture substituted when `create`/`detailsFor` omit the trailing field.
pub const DEFAULT_TEXTURE: &str = "frog.png";

/// A `rotate` message carries a full 4x4 transform after the identifier.
pub const ROTATION_FIELDS: usize = 16;

/// Command tag vocabulary. Tags are matched case-sensitively.
pub mod tags {
    pub const JOIN: &str = "join";
    pub const BYE: &str = "bye";
    pub const CREATE: &str = "create";
    pub const DETAILS_FOR: &str = "detailsFor";
    pub const WANTS_DETAILS: &str = "wantsDetails";
    pub const MOVE: &str = "move";
    pub const ROTATE: &str = "rotate";
    pub const CREATE_BALL: &str = "createBall";
    pub const MOVE_BALL: &str = "moveBall";
    pub const REMOVE_BALL: &str = "removeBall";
    pub const HIT: &str = "hit";
    pub const SHIELD_ACTIVATE: &str = "shieldActivate";
    pub const SHIELD_DEACTIVATE: &str = "shieldDeactivate";
    pub const SHIELD_HIT: &str = "shieldHit";
    pub const SWORD_ANIMATE: &str = "swordAnimate";
}

/// Reasons a raw datagram fails to decode into a [`Command`].
///
/// None of these are ever surfaced to a client; the relay drops the
/// datagram and keeps running.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("empty datagram")]
    Empty,
    #[error("unknown command tag '{0}'")]
    UnknownTag(String),
    #[error("{tag}: expected at least {expected} fields after the tag, got {got}")]
    MissingFields {
        tag: &'static str,
        expected: usize,
        got: usize,
    },
    #[error("{tag}: '{value}' is not a valid identifier")]
    BadIdentifier { tag: &'static str, value: String },
}

/// A fully decoded inbound message.
///
/// Field order within each variant mirrors the wire order after the tag.
/// `DetailsFor` is the one asymmetric command: `requester` is the client the
/// reply is delivered to, while `subject` is the responding client whose
/// avatar the payload describes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Join {
        client: Uuid,
    },
    Bye {
        client: Uuid,
    },
    Create {
        client: Uuid,
        position: [String; 3],
        texture: String,
    },
    DetailsFor {
        requester: Uuid,
        subject: Uuid,
        position: [String; 3],
        texture: String,
    },
    Move {
        client: Uuid,
        position: [String; 3],
    },
    Rotate {
        client: Uuid,
        matrix: Vec<String>,
    },
    CreateBall {
        client: Uuid,
        ball: Uuid,
        position: [String; 3],
    },
    MoveBall {
        client: Uuid,
        ball: Uuid,
        position: [String; 3],
    },
    RemoveBall {
        client: Uuid,
        ball: Uuid,
    },
    Hit {
        target: Uuid,
    },
    ShieldActivate {
        client: Uuid,
    },
    ShieldDeactivate {
        client: Uuid,
    },
    ShieldHit {
        client: Uuid,
    },
    SwordAnimate {
        client: Uuid,
    },
}

impl Command {
    /// The wire tag this command arrived under, mainly for log lines.
    pub fn tag(&self) -> &'static str {
        match self {
            Command::Join { .. } => tags::JOIN,
            Command::Bye { .. } => tags::BYE,
            Command::Create { .. } => tags::CREATE,
            Command::DetailsFor { .. } => tags::DETAILS_FOR,
            Command::Move { .. } => tags::MOVE,
            Command::Rotate { .. } => tags::ROTATE,
            Command::CreateBall { .. } => tags::CREATE_BALL,
            Command::MoveBall { .. } => tags::MOVE_BALL,
            Command::RemoveBall { .. } => tags::REMOVE_BALL,
            Command::Hit { .. } => tags::HIT,
            Command::ShieldActivate { .. } => tags::SHIELD_ACTIVATE,
            Command::ShieldDeactivate { .. } => tags::SHIELD_DEACTIVATE,
            Command::ShieldHit { .. } => tags::SHIELD_HIT,
            Command::SwordAnimate { .. } => tags::SWORD_ANIMATE,
        }
    }
}

/// Decodes one raw datagram into a [`Command`].
///
/// Fails closed: a known tag with too few fields or an unparsable
/// identifier is a [`DecodeError`], never an out-of-range fault. Extra
/// trailing fields beyond a command's schema are ignored.
pub fn decode(raw: &str) -> Result<Command, DecodeError> {
    if raw.trim().is_empty() {
        return Err(DecodeError::Empty);
    }

    let fields: Vec<&str> = raw.split(DELIMITER).collect();
    let tag = fields[0];
    let args = &fields[1..];

    match tag {
        tags::JOIN => {
            require(tags::JOIN, args, 1)?;
            Ok(Command::Join {
                client: identifier(tags::JOIN, args[0])?,
            })
        }
        tags::BYE => {
            require(tags::BYE, args, 1)?;
            Ok(Command::Bye {
                client: identifier(tags::BYE, args[0])?,
            })
        }
        tags::CREATE => {
            require(tags::CREATE, args, 4)?;
            Ok(Command::Create {
                client: identifier(tags::CREATE, args[0])?,
                position: position(args, 1),
                texture: texture_or_default(args, 4),
            })
        }
        tags::DETAILS_FOR => {
            require(tags::DETAILS_FOR, args, 5)?;
            Ok(Command::DetailsFor {
                requester: identifier(tags::DETAILS_FOR, args[0])?,
                subject: identifier(tags::DETAILS_FOR, args[1])?,
                position: position(args, 2),
                texture: texture_or_default(args, 5),
            })
        }
        tags::MOVE => {
            require(tags::MOVE, args, 4)?;
            Ok(Command::Move {
                client: identifier(tags::MOVE, args[0])?,
                position: position(args, 1),
            })
        }
        tags::ROTATE => {
            require(tags::ROTATE, args, 1 + ROTATION_FIELDS)?;
            Ok(Command::Rotate {
                client: identifier(tags::ROTATE, args[0])?,
                matrix: args[1..1 + ROTATION_FIELDS]
                    .iter()
                    .map(|v| v.to_string())
                    .collect(),
            })
        }
        tags::CREATE_BALL => {
            require(tags::CREATE_BALL, args, 5)?;
            Ok(Command::CreateBall {
                client: identifier(tags::CREATE_BALL, args[0])?,
                ball: identifier(tags::CREATE_BALL, args[1])?,
                position: position(args, 2),
            })
        }
        tags::MOVE_BALL => {
            require(tags::MOVE_BALL, args, 5)?;
            Ok(Command::MoveBall {
                client: identifier(tags::MOVE_BALL, args[0])?,
                ball: identifier(tags::MOVE_BALL, args[1])?,
                position: position(args, 2),
            })
        }
        tags::REMOVE_BALL => {
            require(tags::REMOVE_BALL, args, 2)?;
            Ok(Command::RemoveBall {
                client: identifier(tags::REMOVE_BALL, args[0])?,
                ball: identifier(tags::REMOVE_BALL, args[1])?,
            })
        }
        tags::HIT => {
            require(tags::HIT, args, 1)?;
            Ok(Command::Hit {
                target: identifier(tags::HIT, args[0])?,
            })
        }
        tags::SHIELD_ACTIVATE => {
            require(tags::SHIELD_ACTIVATE, args, 1)?;
            Ok(Command::ShieldActivate {
                client: identifier(tags::SHIELD_ACTIVATE, args[0])?,
            })
        }
        tags::SHIELD_DEACTIVATE => {
            require(tags::SHIELD_DEACTIVATE, args, 1)?;
            Ok(Command::ShieldDeactivate {
                client: identifier(tags::SHIELD_DEACTIVATE, args[0])?,
            })
        }
        tags::SHIELD_HIT => {
            require(tags::SHIELD_HIT, args, 1)?;
            Ok(Command::ShieldHit {
                client: identifier(tags::SHIELD_HIT, args[0])?,
            })
        }
        tags::SWORD_ANIMATE => {
            require(tags::SWORD_ANIMATE, args, 1)?;
            Ok(Command::SwordAnimate {
                client: identifier(tags::SWORD_ANIMATE, args[0])?,
            })
        }
        unknown => Err(DecodeError::UnknownTag(unknown.to_string())),
    }
}

/// Joins a tag and its fields into one wire message.
///
/// Pure string join; performs no escaping.
pub fn encode<I, S>(tag: &str, fields: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut message = String::from(tag);
    for field in fields {
        message.push(DELIMITER);
        message.push_str(field.as_ref());
    }
    message
}

fn require(tag: &'static str, args: &[&str], expected: usize) -> Result<(), DecodeError> {
    if args.len() < expected {
        return Err(DecodeError::MissingFields {
            tag,
            expected,
            got: args.len(),
        });
    }
    Ok(())
}

fn identifier(tag: &'static str, value: &str) -> Result<Uuid, DecodeError> {
    Uuid::parse_str(value).map_err(|_| DecodeError::BadIdentifier {
        tag,
        value: value.to_string(),
    })
}

fn position(args: &[&str], start: usize) -> [String; 3] {
    [
        args[start].to_string(),
        args[start + 1].to_string(),
        args[start + 2].to_string(),
    ]
}

fn texture_or_default(args: &[&str], index: usize) -> String {
    args.get(index)
        .map(|t| t.to_string())
        .unwrap_or_else(|| DEFAULT_TEXTURE.to_string())
}
