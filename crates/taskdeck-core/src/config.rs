use std::collections::BTreeMap;
use std::fs;
use std::path::{
  Path,
  PathBuf
};
use std::time::Duration;

use anyhow::{
  Context,
  anyhow
};
use tracing::{
  debug,
  info,
  trace,
  warn
};

use crate::api::DEFAULT_BASE_URL;
use crate::datetime::{
  DayZone,
  TIMEZONE_ENV_VAR
};

pub const CONFIG_ENV_VAR: &str =
  "TASKDECKRC";
pub const API_URL_ENV_VAR: &str =
  "TASKDECK_API_URL";
const CONFIG_FILE_NAME: &str =
  ".taskdeckrc";

pub const KEY_API_URL: &str = "api.url";
pub const KEY_API_TIMEOUT: &str =
  "api.timeout";
pub const KEY_DEBOUNCE_MS: &str =
  "search.debounce_ms";
pub const KEY_TIMEZONE: &str =
  "timezone";
pub const KEY_COLOR: &str = "color";
pub const KEY_SHOW_DONE: &str =
  "show_done";
pub const KEY_DEFAULT_FILTER: &str =
  "default.filter";

#[derive(Debug, Clone)]
pub struct Config {
  map:              BTreeMap<String, String>,
  pub loaded_files: Vec<PathBuf>
}

impl Default for Config {
  fn default() -> Self {
    let mut map = BTreeMap::new();
    for (key, value) in [
      (KEY_API_URL, DEFAULT_BASE_URL),
      (KEY_API_TIMEOUT, "30"),
      (KEY_DEBOUNCE_MS, "300"),
      (KEY_TIMEZONE, "local"),
      (KEY_COLOR, "on"),
      (KEY_SHOW_DONE, "yes"),
      (KEY_DEFAULT_FILTER, "all")
    ] {
      map.insert(
        key.to_string(),
        value.to_string()
      );
    }

    Self {
      map,
      loaded_files: vec![]
    }
  }
}

impl Config {
  /// Defaults, then the rc file, then the
  /// environment.
  #[tracing::instrument(skip(
    rc_override
  ))]
  pub fn load(
    rc_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let mut cfg = Config::default();

    let rc = resolve_rc_path(rc_override)?;
    if let Some(path) = rc {
      info!(rc = %path.display(), "loading taskdeckrc");
      cfg.load_file(&path)?;
    } else {
      debug!(
        "no taskdeckrc found; using \
         defaults"
      );
    }

    cfg.apply_env_with(|name| {
      std::env::var(name).ok()
    });
    Ok(cfg)
  }

  pub fn apply_env_with<F>(
    &mut self,
    lookup: F
  ) where
    F: Fn(&str) -> Option<String>
  {
    for (var, key) in [
      (API_URL_ENV_VAR, KEY_API_URL),
      (TIMEZONE_ENV_VAR, KEY_TIMEZONE)
    ] {
      if let Some(value) = lookup(var)
        .filter(|v| !v.trim().is_empty())
      {
        debug!(var, key, value = %value, "applying environment override");
        self.set(key, value);
      }
    }
  }

  #[tracing::instrument(skip(
    self, overrides
  ))]
  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (k, v) in overrides {
      let key = k
        .strip_prefix("rc.")
        .unwrap_or(&k)
        .to_string();
      debug!(key = %key, value = %v, "applying override");
      self.map.insert(key, v);
    }
  }

  pub fn set(
    &mut self,
    key: &str,
    value: impl Into<String>
  ) {
    self
      .map
      .insert(key.to_string(), value.into());
  }

  pub fn get(
    &self,
    key: &str
  ) -> Option<String> {
    self.map.get(key).cloned()
  }

  pub fn get_bool(
    &self,
    key: &str
  ) -> Option<bool> {
    self
      .map
      .get(key)
      .map(|v| parse_bool(v))
  }

  pub fn api_url(&self) -> String {
    self
      .get(KEY_API_URL)
      .unwrap_or_else(|| {
        DEFAULT_BASE_URL.to_string()
      })
  }

  pub fn api_timeout(
    &self
  ) -> anyhow::Result<Duration> {
    let secs =
      self.parse_u64(KEY_API_TIMEOUT)?;
    if secs == 0 {
      return Err(anyhow!(
        "{KEY_API_TIMEOUT} must be at \
         least 1 second"
      ));
    }
    Ok(Duration::from_secs(secs))
  }

  pub fn debounce_window(
    &self
  ) -> anyhow::Result<Duration> {
    Ok(Duration::from_millis(
      self.parse_u64(KEY_DEBOUNCE_MS)?
    ))
  }

  pub fn day_zone(
    &self
  ) -> anyhow::Result<DayZone> {
    let raw = self
      .get(KEY_TIMEZONE)
      .unwrap_or_default();
    DayZone::parse(&raw).with_context(
      || {
        format!(
          "invalid {KEY_TIMEZONE} \
           setting"
        )
      }
    )
  }

  pub fn show_done(&self) -> bool {
    self
      .get_bool(KEY_SHOW_DONE)
      .unwrap_or(true)
  }

  fn parse_u64(
    &self,
    key: &str
  ) -> anyhow::Result<u64> {
    let raw = self
      .get(key)
      .ok_or_else(|| {
        anyhow!("missing {key} setting")
      })?;
    raw.trim().parse::<u64>().with_context(
      || {
        format!(
          "{key} must be a whole \
           number, got '{raw}'"
        )
      }
    )
  }

  #[tracing::instrument(skip(self))]
  pub fn load_file(
    &mut self,
    path: &Path
  ) -> anyhow::Result<()> {
    let path = expand_tilde(path);
    let text =
      fs::read_to_string(&path)
        .with_context(|| {
          format!(
            "failed to read {}",
            path.display()
          )
        })?;

    self
      .loaded_files
      .push(path.clone());

    let base_dir = path
      .parent()
      .map(|p| p.to_path_buf())
      .unwrap_or_else(|| {
        PathBuf::from(".")
      });

    for (line_num, raw_line) in
      text.lines().enumerate()
    {
      let mut line = raw_line.trim();
      if let Some((before, _)) =
        line.split_once('#')
      {
        line = before.trim();
      }

      if line.is_empty() {
        continue;
      }

      if let Some(include_rest) =
        line.strip_prefix("include ")
      {
        let include_path =
          resolve_include_path(
            &base_dir,
            include_rest.trim()
          )?;
        if self
          .loaded_files
          .contains(&include_path)
        {
          warn!(include = %include_path.display(), "include cycle; skipping");
          continue;
        }

        if include_path.exists() {
          self
            .load_file(&include_path)?;
        } else {
          warn!(include = %include_path.display(), "include file does not exist; skipping");
        }
        continue;
      }

      let (k, v) = line
        .split_once('=')
        .ok_or_else(|| {
          anyhow!(
            "invalid config line \
             {}:{}: {}",
            path.display(),
            line_num + 1,
            raw_line
          )
        })?;

      let key = k.trim().to_string();
      let value = v.trim().to_string();
      trace!(key = %key, value = %value, "loaded config key");
      self.map.insert(key, value);
    }

    Ok(())
  }
}

#[tracing::instrument(skip(
  override_path
))]
fn resolve_rc_path(
  override_path: Option<&Path>
) -> anyhow::Result<Option<PathBuf>> {
  if let Some(path) = override_path {
    return Ok(Some(path.to_path_buf()));
  }

  if let Ok(rc_env) =
    std::env::var(CONFIG_ENV_VAR)
  {
    if rc_env == "/dev/null" {
      return Ok(None);
    }
    return Ok(Some(PathBuf::from(
      rc_env
    )));
  }

  let Some(home) = dirs::home_dir() else {
    warn!(
      "cannot determine home \
       directory; skipping taskdeckrc"
    );
    return Ok(None);
  };
  let candidate =
    home.join(CONFIG_FILE_NAME);
  if candidate.exists() {
    return Ok(Some(candidate));
  }

  Ok(None)
}

fn resolve_include_path(
  base_dir: &Path,
  include: &str
) -> anyhow::Result<PathBuf> {
  if include.trim().is_empty() {
    return Err(anyhow!(
      "include path cannot be empty"
    ));
  }

  let raw = PathBuf::from(include);
  let expanded = expand_tilde(&raw);
  if expanded.is_absolute() {
    Ok(expanded)
  } else {
    Ok(base_dir.join(expanded))
  }
}

fn expand_tilde(
  path: &Path
) -> PathBuf {
  let text = path.to_string_lossy();
  if let Some(rest) =
    text.strip_prefix("~/")
    && let Some(home) = dirs::home_dir()
  {
    return home.join(rest);
  }
  path.to_path_buf()
}

fn parse_bool(s: &str) -> bool {
  matches!(
    s.trim()
      .to_ascii_lowercase()
      .as_str(),
    "1" | "y" | "yes" | "on" | "true"
  )
}
