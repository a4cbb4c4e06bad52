//! netrc credential lookup
//!
//! Supports `machine`, `default`, `login`, `password`, `account` and skips
//! `macdef` bodies. Tokens may be double-quoted.

use std::path::{Path, PathBuf};

use log::debug;

use crate::core::auth::{CredentialLookup, Credentials};
use crate::core::error::{Error, Result};
use crate::core::options::NetrcSource;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Entry {
    login: Option<String>,
    password: Option<String>,
    account: Option<String>,
}

/// Parsed netrc file
#[derive(Debug, Clone, Default)]
pub struct Netrc {
    machines: Vec<(String, Entry)>,
    default: Option<Entry>,
}

struct Token {
    value: String,
    line: usize,
}

impl Netrc {
    /// Resolve a netrc source into a parsed file, if any.
    ///
    /// A missing file at the default location disables the lookup; a missing
    /// explicit file is an error.
    pub fn load(source: &NetrcSource) -> Result<Option<Self>> {
        match source {
            NetrcSource::Disabled => Ok(None),
            NetrcSource::DefaultLocation => {
                let Some(path) = default_path() else {
                    debug!("no home directory, netrc lookup disabled");
                    return Ok(None);
                };
                match std::fs::read_to_string(&path) {
                    Ok(text) => Self::parse(&text, &path).map(Some),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                        debug!("{} not found, netrc lookup disabled", path.display());
                        Ok(None)
                    }
                    Err(e) => Err(Error::Io(e)),
                }
            }
            NetrcSource::Path(path) => Self::from_file(path).map(Some),
        }
    }

    /// Read and parse a netrc file
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text, path)
    }

    /// Parse netrc text; `path` is only used in error messages
    pub fn parse(text: &str, path: &Path) -> Result<Self> {
        let mut netrc = Netrc::default();
        let mut tokens = tokenize(text).into_iter();
        // Index into `machines`, or `None` for the default entry
        let mut current: Option<Option<usize>> = None;

        let fail = |line: usize, message: String| Error::Netrc {
            path: path.to_path_buf(),
            line,
            message,
        };

        while let Some(token) = tokens.next() {
            match token.value.as_str() {
                "machine" => {
                    let name = tokens
                        .next()
                        .ok_or_else(|| fail(token.line, "missing host after 'machine'".into()))?;
                    netrc.machines.push((name.value, Entry::default()));
                    current = Some(Some(netrc.machines.len() - 1));
                }
                "default" => {
                    netrc.default = Some(Entry::default());
                    current = Some(None);
                }
                "macdef" => {
                    tokens
                        .next()
                        .ok_or_else(|| fail(token.line, "missing name after 'macdef'".into()))?;
                }
                key @ ("login" | "password" | "account") => {
                    let value = tokens
                        .next()
                        .ok_or_else(|| fail(token.line, format!("missing value after '{key}'")))?;
                    let entry = match current {
                        Some(Some(index)) => &mut netrc.machines[index].1,
                        Some(None) => netrc.default.get_or_insert_with(Entry::default),
                        None => {
                            return Err(fail(
                                token.line,
                                format!("'{key}' outside of a machine entry"),
                            ))
                        }
                    };
                    let slot = match key {
                        "login" => &mut entry.login,
                        "password" => &mut entry.password,
                        _ => &mut entry.account,
                    };
                    *slot = Some(value.value);
                }
                other => {
                    return Err(fail(token.line, format!("unexpected token '{other}'")));
                }
            }
        }

        Ok(netrc)
    }
}

impl CredentialLookup for Netrc {
    fn lookup(&self, host: &str) -> Option<Credentials> {
        let entry = self
            .machines
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(host))
            .map(|(_, entry)| entry)
            .or(self.default.as_ref())?;
        let login = entry.login.clone()?;
        Some(Credentials {
            login,
            password: entry.password.clone().unwrap_or_default(),
        })
    }
}

fn default_path() -> Option<PathBuf> {
    home::home_dir().map(|home| home.join(".netrc"))
}

/// Split netrc text into tokens, dropping comments and macro bodies
fn tokenize(text: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut in_macdef = false;

    for (index, line) in text.lines().enumerate() {
        let line_no = index + 1;
        if in_macdef {
            // Macro bodies run until the first empty line
            if line.trim().is_empty() {
                in_macdef = false;
            }
            continue;
        }

        let mut words = split_line(line);
        if let Some(pos) = words.iter().position(|w| w == "macdef") {
            words.truncate(pos + 2);
            in_macdef = true;
        }
        tokens.extend(words.into_iter().map(|value| Token {
            value,
            line: line_no,
        }));
    }

    tokens
}

fn split_line(line: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut chars = line.chars().peekable();

    loop {
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        let Some(&first) = chars.peek() else { break };

        if first == '#' {
            break;
        }

        let mut word = String::new();
        if first == '"' {
            chars.next();
            while let Some(c) = chars.next() {
                match c {
                    '"' => break,
                    '\\' => {
                        if let Some(escaped) = chars.next() {
                            word.push(escaped);
                        }
                    }
                    _ => word.push(c),
                }
            }
        } else {
            while let Some(c) = chars.next_if(|c| !c.is_whitespace()) {
                word.push(c);
            }
        }
        words.push(word);
    }

    words
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn parse(text: &str) -> Netrc {
        Netrc::parse(text, Path::new("test.netrc")).unwrap()
    }

    #[test]
    fn test_machine_lookup() {
        let netrc = parse(
            "machine logs.example.com login alice password s3cret\n\
             machine other.example.com\n  login bob\n  password hunter2\n",
        );
        assert_eq!(
            netrc.lookup("logs.example.com"),
            Some(Credentials {
                login: "alice".into(),
                password: "s3cret".into()
            })
        );
        assert_eq!(netrc.lookup("OTHER.example.com").unwrap().login, "bob");
        assert_eq!(netrc.lookup("unknown.example.com"), None);
    }

    #[test]
    fn test_default_entry() {
        let netrc = parse("machine a login x password y\ndefault login anon password guest\n");
        assert_eq!(netrc.lookup("a").unwrap().login, "x");
        assert_eq!(
            netrc.lookup("b"),
            Some(Credentials {
                login: "anon".into(),
                password: "guest".into()
            })
        );
    }

    #[test]
    fn test_comments_quotes_and_macdef() {
        let netrc = parse(
            "# personal servers\n\
             machine h login \"john doe\" password \"pa ss\\\"word\" # trailing\n\
             macdef init\n\
             cd /pub\n\
             get README\n\
             \n\
             machine k login kim account ops\n",
        );
        let creds = netrc.lookup("h").unwrap();
        assert_eq!(creds.login, "john doe");
        assert_eq!(creds.password, "pa ss\"word");

        // Entry without password still authenticates with an empty one
        let creds = netrc.lookup("k").unwrap();
        assert_eq!(creds.login, "kim");
        assert_eq!(creds.password, "");
    }

    #[test]
    fn test_machine_without_login_is_no_match() {
        let netrc = parse("machine h password only\n");
        assert_eq!(netrc.lookup("h"), None);
    }

    #[test]
    fn test_parse_errors_report_line() {
        let err = Netrc::parse("machine h\nlogin\n", Path::new("x.netrc")).unwrap_err();
        match err {
            Error::Netrc { line, message, .. } => {
                assert_eq!(line, 2);
                assert!(message.contains("login"));
            }
            other => panic!("expected netrc error, got {other:?}"),
        }

        let err = Netrc::parse("login orphan\n", Path::new("x.netrc")).unwrap_err();
        assert!(matches!(err, Error::Netrc { line: 1, .. }));

        let err = Netrc::parse("machine h bogus value\n", Path::new("x.netrc")).unwrap_err();
        assert!(err.to_string().contains("unexpected token 'bogus'"));
    }

    #[test]
    fn test_load_sources() {
        assert!(Netrc::load(&NetrcSource::Disabled).unwrap().is_none());

        let dir = tempdir().unwrap();
        let path = dir.path().join("netrc");
        std::fs::write(&path, "machine h login u password p\n").unwrap();
        let netrc = Netrc::load(&NetrcSource::Path(path)).unwrap().unwrap();
        assert_eq!(netrc.lookup("h").unwrap().password, "p");

        let missing = dir.path().join("missing");
        assert!(matches!(
            Netrc::load(&NetrcSource::Path(missing)),
            Err(Error::Io(_))
        ));
    }
}
