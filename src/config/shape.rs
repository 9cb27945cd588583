use std::path::PathBuf;
use std::collections::HashMap;

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Db {
    pub user: Option<String>,
    pub password: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub dbname: Option<String>,
    pub max_connections: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct Listener {
    pub addr: String,
}

#[derive(Debug, Deserialize)]
pub struct WebDav {
    pub prefix: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Auth {
    pub header: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Upload {
    pub max_size: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct Activity {
    pub sink: Option<super::ActivitySink>,
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub data: Option<PathBuf>,

    pub listeners: Option<HashMap<String, Listener>>,

    pub db: Option<Db>,

    pub webdav: Option<WebDav>,
    pub auth: Option<Auth>,
    pub upload: Option<Upload>,
    pub activity: Option<Activity>,
}
