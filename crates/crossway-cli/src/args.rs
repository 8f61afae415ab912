//! Command-line parsing for the `crossway` binary.
//!
//! ```text
//! crossway replay <log.json> [--config <scenario.toml>] [--realtime] [--json]
//! crossway schema
//! crossway help
//! ```

use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Replay(ReplayArgs),
    Schema,
    Help,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReplayArgs {
    pub log: PathBuf,
    pub config: Option<PathBuf>,
    /// Sleep one tick period between ticks.
    pub realtime: bool,
    /// Print the summary as JSON instead of a table.
    pub json: bool,
}

/// Parse everything after the program name.
pub fn parse<I, S>(args: I) -> Result<Command, String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut args = args.into_iter().map(Into::into);
    let Some(cmd) = args.next() else {
        return Ok(Command::Help);
    };

    match cmd.as_str() {
        "help" | "--help" | "-h" => Ok(Command::Help),
        "schema" => Ok(Command::Schema),
        "replay" => {
            let mut replay = ReplayArgs::default();
            let mut log = None;
            while let Some(arg) = args.next() {
                match arg.as_str() {
                    "--config" | "-c" => {
                        let path = args.next().ok_or("--config needs a path")?;
                        replay.config = Some(PathBuf::from(path));
                    }
                    "--realtime" => replay.realtime = true,
                    "--json" => replay.json = true,
                    flag if flag.starts_with('-') => {
                        return Err(format!("unknown flag '{flag}'"));
                    }
                    path => {
                        if log.is_some() {
                            return Err(format!("unexpected argument '{path}'"));
                        }
                        log = Some(PathBuf::from(path));
                    }
                }
            }
            replay.log = log.ok_or("replay needs a log file")?;
            Ok(Command::Replay(replay))
        }
        other => Err(format!("unknown command '{other}'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_arguments_is_help() {
        assert_eq!(parse(Vec::<String>::new()), Ok(Command::Help));
    }

    #[test]
    fn replay_with_all_flags() {
        let cmd = parse(["replay", "run.json", "--config", "stop.toml", "--realtime", "--json"]).unwrap();
        assert_eq!(
            cmd,
            Command::Replay(ReplayArgs {
                log: PathBuf::from("run.json"),
                config: Some(PathBuf::from("stop.toml")),
                realtime: true,
                json: true,
            })
        );
    }

    #[test]
    fn flags_may_precede_the_log() {
        let Command::Replay(args) = parse(["replay", "--realtime", "run.json"]).unwrap() else {
            panic!("expected replay");
        };
        assert!(args.realtime);
        assert_eq!(args.log, PathBuf::from("run.json"));
    }

    #[test]
    fn replay_without_log_is_an_error() {
        assert!(parse(["replay"]).is_err());
        assert!(parse(["replay", "--config"]).is_err());
    }

    #[test]
    fn unknown_input_is_rejected() {
        assert!(parse(["drive"]).is_err());
        assert!(parse(["replay", "a.json", "--fast"]).is_err());
        assert!(parse(["replay", "a.json", "b.json"]).is_err());
    }
}
