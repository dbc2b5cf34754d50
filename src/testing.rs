use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use kube::config::Kubeconfig;
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::io;
use std::net::SocketAddr;
use std::sync::Mutex;
use url::Url;

use crate::cloud::exchange::{TokenExchanger, TokenResponse};
use crate::cloud::login::Browser;
use crate::cloud::provider::{Provider, ProviderRepository};
use crate::cloud::spaces::SpacesApi;
use crate::error::{Error, Result};
use crate::k8s::generated::LastContextStore;
use crate::k8s::kubeconfig::KubeconfigSource;
use crate::model::{LastContextRecord, Space};
use crate::terminal::{Log, Prompt, QuestionOptions};

pub const KUBECONFIG_FIXTURE: &str = r#"apiVersion: v1
kind: Config
current-context: dev
clusters:
- name: dev-cluster
  cluster:
    server: http://127.0.0.1:6443
- name: prod-cluster
  cluster:
    server: https://203.0.113.10:6443
- name: private-cluster
  cluster:
    server: https://10.0.0.5:6443
contexts:
- name: dev
  context:
    cluster: dev-cluster
    user: dev-user
- name: prod
  context:
    cluster: prod-cluster
    user: dev-user
    namespace: web
- name: internal
  context:
    cluster: private-cluster
    user: dev-user
users:
- name: dev-user
  user:
    token: abc
"#;

pub fn jwt_with_exp(exp: Option<i64>) -> String {
    let header = URL_SAFE_NO_PAD.encode(json!({"alg": "HS256", "typ": "JWT"}).to_string());
    let claims = match exp {
        Some(exp) => json!({"sub": "tester", "exp": exp}),
        None => json!({"sub": "tester"}),
    };
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.signature")
}

pub struct CountingExchanger {
    response: TokenResponse,
    keys: Mutex<Vec<String>>,
}

impl CountingExchanger {
    pub fn ok(token: String) -> Self {
        Self::respond(200, token)
    }

    pub fn status(status: u16, body: &str) -> Self {
        Self::respond(status, body.to_string())
    }

    fn respond(status: u16, body: String) -> Self {
        Self {
            response: TokenResponse { status, body },
            keys: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.keys.lock().unwrap().len()
    }

    pub fn last_key(&self) -> Option<String> {
        self.keys.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl TokenExchanger for CountingExchanger {
    async fn exchange(&self, _host: &str, key: &str) -> Result<TokenResponse> {
        self.keys.lock().unwrap().push(key.to_string());
        Ok(self.response.clone())
    }
}

#[derive(Default)]
pub struct MemoryProviderRepository {
    providers: Mutex<HashMap<String, Provider>>,
    saves: Mutex<usize>,
    failing: bool,
}

impl MemoryProviderRepository {
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn saves(&self) -> usize {
        *self.saves.lock().unwrap()
    }

    pub fn stored(&self, name: &str) -> Option<Provider> {
        self.providers.lock().unwrap().get(name).cloned()
    }
}

impl ProviderRepository for MemoryProviderRepository {
    fn load(&self, name: &str) -> Result<Provider> {
        self.stored(name)
            .ok_or_else(|| Error::configuration(format!("provider '{name}' not found")))
    }

    fn save(&self, provider: &Provider) -> Result<()> {
        if self.failing {
            return Err(Error::configuration("provider store is read-only"));
        }
        *self.saves.lock().unwrap() += 1;
        self.providers
            .lock()
            .unwrap()
            .insert(provider.name.clone(), provider.clone());
        Ok(())
    }
}

/// Stands in for the system browser. When delivering, it plays the web page
/// by calling the callback listener named in the login URL's redirect.
pub struct FakeBrowser {
    opens: bool,
    deliver: Option<String>,
    callback: Mutex<Option<SocketAddr>>,
}

impl FakeBrowser {
    pub fn delivering(key: &str) -> Self {
        Self::build(true, Some(key))
    }

    pub fn failing() -> Self {
        Self::build(false, None)
    }

    pub fn failing_but_delivering(key: &str) -> Self {
        Self::build(false, Some(key))
    }

    pub fn silent() -> Self {
        Self::build(true, None)
    }

    fn build(opens: bool, deliver: Option<&str>) -> Self {
        Self {
            opens,
            deliver: deliver.map(str::to_string),
            callback: Mutex::new(None),
        }
    }

    pub fn callback_addr(&self) -> Option<SocketAddr> {
        *self.callback.lock().unwrap()
    }
}

impl Browser for FakeBrowser {
    fn open(&self, url: &str) -> io::Result<()> {
        let login = Url::parse(url).map_err(io::Error::other)?;
        let redirect = login
            .query_pairs()
            .find(|(name, _)| name == "redirect")
            .map(|(_, value)| value.into_owned())
            .ok_or_else(|| io::Error::other("login url has no redirect"))?;
        let mut callback = Url::parse(&redirect).map_err(io::Error::other)?;
        let addr = format!(
            "{}:{}",
            callback.host_str().unwrap_or_default(),
            callback.port().unwrap_or_default()
        )
        .parse::<SocketAddr>()
        .map_err(io::Error::other)?;
        *self.callback.lock().unwrap() = Some(addr);

        if let Some(key) = self.deliver.clone() {
            callback.query_pairs_mut().append_pair("key", &key);
            tokio::spawn(async move {
                let client = reqwest::Client::builder()
                    .redirect(reqwest::redirect::Policy::none())
                    .build()
                    .unwrap();
                let _ = client.get(callback).send().await;
            });
        }

        if self.opens {
            Ok(())
        } else {
            Err(io::Error::new(io::ErrorKind::NotFound, "no browser available"))
        }
    }
}

enum PromptScript {
    Answers(Mutex<VecDeque<String>>),
    Failing,
}

/// Replays canned answers. Once they run out the question never completes.
pub struct ScriptedPrompt {
    script: PromptScript,
    questions: Mutex<Vec<QuestionOptions>>,
}

impl ScriptedPrompt {
    pub fn answering<'a>(answers: impl IntoIterator<Item = &'a str>) -> Self {
        let answers = answers.into_iter().map(str::to_string).collect();
        Self::with_script(PromptScript::Answers(Mutex::new(answers)))
    }

    pub fn pending() -> Self {
        Self::answering(Vec::<&str>::new())
    }

    pub fn failing() -> Self {
        Self::with_script(PromptScript::Failing)
    }

    fn with_script(script: PromptScript) -> Self {
        Self {
            script,
            questions: Mutex::new(Vec::new()),
        }
    }

    pub fn asked(&self) -> usize {
        self.questions.lock().unwrap().len()
    }

    pub fn last_question(&self) -> Option<QuestionOptions> {
        self.questions.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl Prompt for ScriptedPrompt {
    async fn question(&self, options: &QuestionOptions) -> io::Result<String> {
        self.questions.lock().unwrap().push(options.clone());
        let next = match &self.script {
            PromptScript::Failing => {
                return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "stdin closed"));
            }
            PromptScript::Answers(answers) => answers.lock().unwrap().pop_front(),
        };
        match next {
            Some(answer) => Ok(answer),
            None => std::future::pending().await,
        }
    }
}

pub struct StaticSpaces {
    accept: bool,
    calls: Mutex<usize>,
}

impl StaticSpaces {
    pub fn ok() -> Self {
        Self {
            accept: true,
            calls: Mutex::new(0),
        }
    }

    pub fn rejecting() -> Self {
        Self {
            accept: false,
            calls: Mutex::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl SpacesApi for StaticSpaces {
    async fn list_spaces(&self, _host: &str, _token: &str) -> Result<Vec<Space>> {
        *self.calls.lock().unwrap() += 1;
        if !self.accept {
            return Err(Error::auth("unauthorized to list spaces"));
        }
        Ok(vec![Space {
            id: 1,
            name: "default".to_string(),
        }])
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogEntry {
    Info(String),
    Warn(String),
    Blank,
    StartWait(String),
    StopWait,
}

#[derive(Default)]
pub struct RecordingLog {
    entries: Mutex<Vec<LogEntry>>,
}

impl RecordingLog {
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().unwrap().clone()
    }

    pub fn infos(&self) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter_map(|entry| match entry {
                LogEntry::Info(line) => Some(line),
                _ => None,
            })
            .collect()
    }

    pub fn warns(&self) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter_map(|entry| match entry {
                LogEntry::Warn(line) => Some(line),
                _ => None,
            })
            .collect()
    }

    /// Started and stopped wait indicators.
    pub fn waits(&self) -> (usize, usize) {
        let entries = self.entries();
        let started = entries
            .iter()
            .filter(|entry| matches!(entry, LogEntry::StartWait(_)))
            .count();
        let stopped = entries
            .iter()
            .filter(|entry| matches!(entry, LogEntry::StopWait))
            .count();
        (started, stopped)
    }

    fn push(&self, entry: LogEntry) {
        self.entries.lock().unwrap().push(entry);
    }
}

impl Log for RecordingLog {
    fn info(&self, message: &str) {
        self.push(LogEntry::Info(message.to_string()));
    }

    fn warn(&self, message: &str) {
        self.push(LogEntry::Warn(message.to_string()));
    }

    fn write_line(&self) {
        self.push(LogEntry::Blank);
    }

    fn start_wait(&self, message: &str) {
        self.push(LogEntry::StartWait(message.to_string()));
    }

    fn stop_wait(&self) {
        self.push(LogEntry::StopWait);
    }
}

pub struct MemoryKubeconfig {
    raw: Mutex<String>,
    writes: Mutex<usize>,
}

impl MemoryKubeconfig {
    pub fn new(raw: &str) -> Self {
        Self {
            raw: Mutex::new(raw.to_string()),
            writes: Mutex::new(0),
        }
    }

    pub fn writes(&self) -> usize {
        *self.writes.lock().unwrap()
    }

    pub fn current_context(&self) -> Option<String> {
        self.load().ok().and_then(|config| config.current_context)
    }
}

impl KubeconfigSource for MemoryKubeconfig {
    fn load(&self) -> Result<Kubeconfig> {
        serde_yaml::from_str(&self.raw.lock().unwrap())
            .map_err(|err| Error::configuration_with("failed to parse kube config", err))
    }

    fn save_current_context(&self, context: &str) -> Result<()> {
        let mut raw = self.raw.lock().unwrap();
        let mut document: serde_yaml::Value = serde_yaml::from_str(&raw)
            .map_err(|err| Error::configuration_with("failed to parse kube config", err))?;
        if let Some(mapping) = document.as_mapping_mut() {
            mapping.insert("current-context".into(), context.into());
        }
        *raw = serde_yaml::to_string(&document)
            .map_err(|err| Error::configuration_with("failed to render kube config", err))?;
        *self.writes.lock().unwrap() += 1;
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryLastContext {
    record: Mutex<Option<LastContextRecord>>,
    saves: Mutex<usize>,
    failing: bool,
}

impl MemoryLastContext {
    pub fn with(record: LastContextRecord) -> Self {
        Self {
            record: Mutex::new(Some(record)),
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn saves(&self) -> usize {
        *self.saves.lock().unwrap()
    }

    pub fn current(&self) -> Option<LastContextRecord> {
        self.record.lock().unwrap().clone()
    }
}

impl LastContextStore for MemoryLastContext {
    fn load(&self) -> Result<Option<LastContextRecord>> {
        Ok(self.current())
    }

    fn save(&self, record: &LastContextRecord) -> Result<()> {
        if self.failing {
            return Err(Error::configuration("generated file is read-only"));
        }
        *self.saves.lock().unwrap() += 1;
        *self.record.lock().unwrap() = Some(record.clone());
        Ok(())
    }
}
