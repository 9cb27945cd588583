use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::net::{SocketAddr, IpAddr};
use std::fmt::{Display, Formatter};

use axum::http::HeaderName;
use clap::Parser;

use crate::error::{self, Context};
use crate::path::{metadata, normalize};

mod shape;

pub const DEFAULT_WEBDAV_PREFIX: &str = "/webdav";
pub const DEFAULT_AUTH_HEADER: &str = "x-stratus-owner";

#[derive(Debug, Parser)]
#[command(author, version ,about, long_about = None)]
pub struct CliArgs {
    /// a config path or directory to load file from
    #[arg(long)]
    config: Vec<PathBuf>
}

#[derive(Debug)]
pub struct Config {
    pub settings: Settings,
}

pub fn get_config() -> error::Result<Config> {
    Config::from_args(CliArgs::parse())
}

impl Config {
    pub fn from_args(args: CliArgs) -> error::Result<Self> {
        let cwd = std::env::current_dir()
            .context("failed to retrieve cwd for Settings")?;
        let mut settings = Settings::relative_to(&cwd);

        for config_path in args.config {
            let full = if config_path.is_absolute() {
                config_path
            } else {
                normalize(cwd.join(config_path))
            };

            tracing::debug!("loading config file \"{}\"", full.display());

            let loaded = Self::load_file(&full)?;
            let src = SrcFile::new(&full)?;
            let dot = DotPath::new("settings");

            settings.merge(&src, dot, loaded)?;
        }

        {
            let meta = metadata(&settings.data).context(
                "failed to retrieve metadata for settings.data"
            )?.context(
                "settings.data does not exist"
            )?;

            if !meta.is_dir() {
                return Err(error::Error::new().context(
                    "settings.data is not a directory"
                ));
            }
        }

        if settings.listeners.is_empty() {
            settings.listeners.insert("default".into(), Listener::default());
        }

        tracing::debug!("{settings:#?}");

        Ok(Config {
            settings,
        })
    }

    fn load_file(path: &PathBuf) -> error::Result<shape::Settings> {
        let ext = path.extension().context(format!(
            "failed to retrieve the file extension for config file: \"{}\"", path.display()
        ))?;

        let ext = ext.to_ascii_lowercase();
        let file = std::fs::OpenOptions::new()
            .read(true)
            .open(path)
            .context(format!("failed to open config file: \"{}\"", path.display()))?;
        let reader = std::io::BufReader::new(file);

        if ext.eq("yaml") || ext.eq("yml") {
            serde_yaml::from_reader(reader).context(format!(
                "failed to parse yaml config file: \"{}\"", path.display()
            ))
        } else if ext.eq("json") {
            serde_json::from_reader(reader).context(format!(
                "failed to parse json config file: \"{}\"", path.display()
            ))
        } else {
            Err(error::Error::new().context(format!(
                "unknown type of config file: \"{}\"", path.display()
            )))
        }
    }
}

struct SrcFile<'a> {
    parent: &'a Path,
    src: &'a Path,
}

impl<'a> SrcFile<'a> {
    fn new(src: &'a Path) -> error::Result<Self> {
        let parent = src.parent().context(format!(
            "failed to retrieve parent path from source file \"{}\"", src.display()
        ))?;

        Ok(SrcFile {
            parent,
            src
        })
    }
}

impl<'a> Display for SrcFile<'a> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "\"{}\"", self.src.display())
    }
}

/// location of a value inside a config file, used in error messages
struct DotPath(String);

impl DotPath {
    fn new(root: &str) -> Self {
        DotPath(root.to_owned())
    }

    fn push(&self, name: impl Display) -> Self {
        DotPath(format!("{}.{name}", self.0))
    }

    /// map keys are quoted so dots inside of them stay readable
    fn key(&self, key: &str) -> Self {
        DotPath(format!("{}.\"{key}\"", self.0))
    }
}

impl Display for DotPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug)]
pub struct Settings {
    pub data: PathBuf,
    pub listeners: HashMap<String, Listener>,
    pub db: Db,
    pub webdav: WebDav,
    pub auth: Auth,
    pub upload: Upload,
    pub activity: ActivitySink,
}

impl Settings {
    fn merge(&mut self, src: &SrcFile<'_>, dot: DotPath, settings: shape::Settings) -> error::Result<()> {
        if let Some(data) = settings.data {
            self.data = check_dir(data, src, dot.push("data"))?;
        }

        if let Some(listeners) = settings.listeners {
            for (key, listener) in listeners {
                if let Some(found) = self.listeners.get_mut(&key) {
                    found.merge(src, dot.key(&key), listener)?;
                } else {
                    let mut default = Listener::default();
                    default.merge(src, dot.key(&key), listener)?;

                    self.listeners.insert(key, default);
                }
            }
        }

        if let Some(db) = settings.db {
            self.db.merge(src, dot.push("db"), db)?;
        }

        if let Some(webdav) = settings.webdav {
            if let Some(prefix) = webdav.prefix {
                self.webdav.prefix = check_url(prefix, src, dot.push("webdav.prefix"))?;
            }
        }

        if let Some(auth) = settings.auth {
            if let Some(header) = auth.header {
                self.auth.header = HeaderName::from_str(&header).context(format!(
                    "{dot}.auth.header \"{header}\" is not a valid header name. file: {src}"
                ))?;
            }
        }

        if let Some(upload) = settings.upload {
            if let Some(max_size) = upload.max_size {
                self.upload.max_size = Some(max_size);
            }
        }

        if let Some(activity) = settings.activity {
            if let Some(sink) = activity.sink {
                self.activity = sink;
            }
        }

        Ok(())
    }
}

impl Settings {
    /// defaults before any config file is applied. blobs go to `data` below
    /// the working directory
    fn relative_to(cwd: &Path) -> Self {
        Settings {
            data: cwd.join("data"),
            listeners: HashMap::new(),
            db: Db::default(),
            webdav: WebDav::default(),
            auth: Auth::default(),
            upload: Upload::default(),
            activity: ActivitySink::Database,
        }
    }
}

#[derive(Debug)]
pub struct Listener {
    pub addr: SocketAddr,
}

impl Listener {
    fn merge(&mut self, src: &SrcFile<'_>, dot_path: DotPath, listener: shape::Listener) -> error::Result<()> {
        self.addr = parse_addr(&listener.addr).context(format!(
            "{dot_path}.addr invalid: \"{}\" file: {src}", listener.addr
        ))?;

        Ok(())
    }
}

impl Default for Listener {
    fn default() -> Self {
        Listener {
            addr: SocketAddr::from((
                IpAddr::from([0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0]),
                8080
            )),
        }
    }
}

/// accepts a full socket address or a bare ip that gets the default port
fn parse_addr(given: &str) -> Option<SocketAddr> {
    match SocketAddr::from_str(given) {
        Ok(valid) => Some(valid),
        Err(_) => IpAddr::from_str(given)
            .ok()
            .map(|ip| SocketAddr::from((ip, 8080)))
    }
}

#[derive(Debug)]
pub struct Db {
    pub user: String,
    pub password: Option<String>,
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub max_connections: usize,
}

impl Db {
    fn merge(&mut self, _src: &SrcFile<'_>, _dot: DotPath, db: shape::Db) -> error::Result<()> {
        if let Some(user) = db.user {
            self.user = user;
        }

        if let Some(password) = db.password {
            self.password = Some(password);
        }

        if let Some(host) = db.host {
            self.host = host;
        }

        if let Some(port) = db.port {
            self.port = port;
        }

        if let Some(dbname) = db.dbname {
            self.dbname = dbname;
        }

        if let Some(max_connections) = db.max_connections {
            self.max_connections = max_connections.max(1);
        }

        Ok(())
    }
}

impl Default for Db {
    fn default() -> Self {
        Db {
            user: "postgres".into(),
            password: None,
            host: "localhost".into(),
            port: 5432,
            dbname: "stratus".into(),
            max_connections: 4,
        }
    }
}

#[derive(Debug)]
pub struct WebDav {
    /// mount point of the webdav tree, always starts with a slash
    pub prefix: String,
}

impl Default for WebDav {
    fn default() -> Self {
        WebDav {
            prefix: DEFAULT_WEBDAV_PREFIX.into(),
        }
    }
}

#[derive(Debug)]
pub struct Auth {
    /// header carrying the owner id verified by the upstream proxy
    pub header: HeaderName,
}

impl Default for Auth {
    fn default() -> Self {
        Auth {
            header: HeaderName::from_static(DEFAULT_AUTH_HEADER),
        }
    }
}

#[derive(Debug, Default)]
pub struct Upload {
    pub max_size: Option<u64>,
}

/// where recorded activities end up
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivitySink {
    Database,
    Log,
}

/// relative paths resolve against the directory of the file they came from
fn check_dir(given: PathBuf, src: &SrcFile<'_>, dot: DotPath) -> error::Result<PathBuf> {
    let full = if given.is_absolute() {
        given
    } else {
        normalize(src.parent.join(given))
    };

    tracing::debug!("{dot} {src} checking {}", full.display());

    let is_dir = metadata(&full)
        .context(format!("{dot} failed to retrieve metadata for: {src}"))?
        .context(format!("{dot} {} was not found. file: {src}", full.display()))?
        .is_dir();

    if !is_dir {
        return Err(error::Error::new().context(format!(
            "{dot} {} is not a directory. file: {src}", full.display()
        )));
    }

    Ok(full)
}

/// normalizes a url path prefix to a leading slash and no trailing slash
fn check_url(given: String, src: &SrcFile<'_>, dot: DotPath) -> error::Result<String> {
    let trimmed = given.trim().trim_end_matches('/');

    let rtn = if trimmed.starts_with('/') {
        trimmed.to_owned()
    } else {
        format!("/{trimmed}")
    };

    if rtn == "/" || rtn.is_empty() {
        return Err(error::Error::new().context(format!(
            "{dot} \"{given}\" cannot be the root path. file: {src}"
        )));
    }

    // url parsing resolves dot segments, so they are checked on the raw path
    for part in rtn.split('/') {
        if part == ".." || part == "." {
            return Err(error::Error::new().context(format!(
                "{dot} \"{given}\" cannot contain dot segments. file: {src}"
            )));
        }
    }

    url::Url::parse(&format!("http://localhost{rtn}")).context(format!(
        "{dot} \"{given}\" is not a valid url path. file: {src}"
    ))?;

    Ok(rtn)
}
