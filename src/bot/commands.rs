//! Prefix command parsing.
//!
//! Pure: turns message text into a [`Command`] without touching Discord, so
//! aliases and argument rules are covered by plain unit tests.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Join,
    Leave,
    Play(String),
    Skip,
    Pause,
    Resume,
    Loop,
    Repeat,
    Previous,
    Queue(usize),
    NowPlaying,
    Stay,
    Autoplay,
    /// Sin argumento muestra el volumen actual
    Volume(Option<i64>),
    Status,
    Help,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("Uso: `{prefix}play <canción o enlace>`")]
    MissingQuery { prefix: String },

    #[error("El volumen debe ser un número entre 0 y 100, no `{0}`")]
    InvalidVolume(String),

    #[error("La página debe ser un número, no `{0}`")]
    InvalidPage(String),
}

impl Command {
    /// Returns `Ok(None)` for messages that are not for this bot: no prefix,
    /// an empty command or an unknown name.
    pub fn parse(prefix: &str, content: &str) -> Result<Option<Self>, CommandError> {
        let Some(rest) = content.trim_start().strip_prefix(prefix) else {
            return Ok(None);
        };

        let rest = rest.trim();
        let (name, args) = match rest.split_once(char::is_whitespace) {
            Some((name, args)) => (name, args.trim()),
            None => (rest, ""),
        };

        let command = match name.to_lowercase().as_str() {
            "join" | "j" => Command::Join,
            "leave" | "l" | "disconnect" | "dc" => Command::Leave,
            "play" | "p" => {
                if args.is_empty() {
                    return Err(CommandError::MissingQuery {
                        prefix: prefix.to_string(),
                    });
                }
                Command::Play(args.to_string())
            }
            "skip" | "s" => Command::Skip,
            "pause" => Command::Pause,
            "resume" => Command::Resume,
            "loop" => Command::Loop,
            "repeat" => Command::Repeat,
            "previous" | "prev" => Command::Previous,
            "queue" | "q" => match first_word(args) {
                None => Command::Queue(1),
                Some(page) => Command::Queue(
                    page.parse()
                        .map_err(|_| CommandError::InvalidPage(page.to_string()))?,
                ),
            },
            "nowplaying" | "np" => Command::NowPlaying,
            "stay" | "247" => Command::Stay,
            "autoplay" => Command::Autoplay,
            "volume" | "v" => match first_word(args) {
                None => Command::Volume(None),
                Some(level) => Command::Volume(Some(
                    level
                        .trim_end_matches('%')
                        .parse()
                        .map_err(|_| CommandError::InvalidVolume(level.to_string()))?,
                )),
            },
            "status" => Command::Status,
            "help" | "h" => Command::Help,
            _ => return Ok(None),
        };

        Ok(Some(command))
    }

    /// Comandos que necesitan que el autor esté en un canal de voz
    pub fn requires_voice(&self) -> bool {
        matches!(
            self,
            Command::Join
                | Command::Play(_)
                | Command::Skip
                | Command::Pause
                | Command::Resume
                | Command::Previous
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::Join => "join",
            Command::Leave => "leave",
            Command::Play(_) => "play",
            Command::Skip => "skip",
            Command::Pause => "pause",
            Command::Resume => "resume",
            Command::Loop => "loop",
            Command::Repeat => "repeat",
            Command::Previous => "previous",
            Command::Queue(_) => "queue",
            Command::NowPlaying => "nowplaying",
            Command::Stay => "stay",
            Command::Autoplay => "autoplay",
            Command::Volume(_) => "volume",
            Command::Status => "status",
            Command::Help => "help",
        }
    }
}

fn first_word(args: &str) -> Option<&str> {
    args.split_whitespace().next()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(content: &str) -> Result<Option<Command>, CommandError> {
        Command::parse("!", content)
    }

    #[test]
    fn aliases_map_to_the_same_command() {
        for alias in ["!leave", "!l", "!disconnect", "!dc", "!DC"] {
            assert_eq!(parse(alias), Ok(Some(Command::Leave)), "{}", alias);
        }
        assert_eq!(parse("!247"), Ok(Some(Command::Stay)));
        assert_eq!(parse("!prev"), Ok(Some(Command::Previous)));
        assert_eq!(parse("!np"), Ok(Some(Command::NowPlaying)));
        assert_eq!(parse("!h"), Ok(Some(Command::Help)));
    }

    #[test]
    fn play_keeps_the_whole_query() {
        assert_eq!(
            parse("!p   daft punk  one more time "),
            Ok(Some(Command::Play("daft punk  one more time".to_string())))
        );
        assert_eq!(
            parse("!play"),
            Err(CommandError::MissingQuery { prefix: "!".to_string() })
        );
    }

    #[test]
    fn volume_argument_is_optional() {
        assert_eq!(parse("!volume"), Ok(Some(Command::Volume(None))));
        assert_eq!(parse("!v 40"), Ok(Some(Command::Volume(Some(40)))));
        assert_eq!(parse("!v 250%"), Ok(Some(Command::Volume(Some(250)))));
        assert_eq!(
            parse("!v alto"),
            Err(CommandError::InvalidVolume("alto".to_string()))
        );
    }

    #[test]
    fn queue_page_defaults_to_first() {
        assert_eq!(parse("!q"), Ok(Some(Command::Queue(1))));
        assert_eq!(parse("!queue 3"), Ok(Some(Command::Queue(3))));
        assert!(parse("!queue tres").is_err());
    }

    #[test]
    fn foreign_messages_are_ignored() {
        assert_eq!(parse("hola"), Ok(None));
        assert_eq!(parse("!"), Ok(None));
        assert_eq!(parse("!bailar"), Ok(None));
        assert_eq!(Command::parse("?", "!play x"), Ok(None));
    }

    #[test]
    fn multi_char_prefix() {
        assert_eq!(Command::parse("vm!", "vm!skip"), Ok(Some(Command::Skip)));
    }

    #[test]
    fn voice_requirement() {
        assert!(Command::Play("x".into()).requires_voice());
        assert!(!Command::Queue(1).requires_voice());
        assert!(!Command::Leave.requires_voice());
    }
}
