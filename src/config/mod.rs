use std::{
    collections::HashMap,
    env,
    fs,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Result};
use directories::BaseDirs;
use tracing::warn;

use crate::execution::OutputLayout;
use crate::render::PlotStyle;

#[derive(Debug, Clone)]
pub struct Config {
    inner: HashMap<String, String>,
    pub config_path: PathBuf,
}

impl Config {
    pub fn load() -> Self {
        let mut map = default_map();
        let config_path = default_config_path();

        // rc file, then .env in the working directory
        for path in [config_path.as_path(), Path::new(".env")] {
            if path.exists() {
                read_pairs(path, &mut map);
            }
        }

        // Overlay environment variables (take precedence)
        for (k, v) in env::vars() {
            if is_config_key(&k) {
                map.insert(k, v);
            }
        }

        Self { inner: map, config_path }
    }

    /// Builds a config from defaults plus explicit pairs, ignoring the rc file and `.env`.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut map = default_map();
        for (k, v) in pairs {
            map.insert(k.into(), v.into());
        }
        Self { inner: map, config_path: default_config_path() }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.inner.get(key).cloned()
    }

    pub fn get_path(&self, key: &str) -> Option<PathBuf> {
        self.get(key).map(PathBuf::from)
    }

    pub fn api_key(&self) -> Result<String> {
        self.get("OPENAI_API_KEY")
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                anyhow!(
                    "Missing OPENAI_API_KEY. Set it in the environment, a .env file or {}",
                    self.config_path.display()
                )
            })
    }

    pub fn output_dir(&self) -> PathBuf {
        self.get_path("OUTPUT_DIR").unwrap_or_else(|| PathBuf::from("output"))
    }

    fn usize_or(&self, key: &str, fallback: usize) -> usize {
        match self.get(key) {
            Some(raw) => raw.trim().parse::<usize>().unwrap_or_else(|_| {
                warn!(key, value = %raw, fallback, "invalid number in config, using default");
                fallback
            }),
            None => fallback,
        }
    }
}

/// Typed view of the settings the agent passes through to the model service and renderer.
#[derive(Debug, Clone)]
pub struct AgentSettings {
    pub model: String,
    pub vision_model: String,
    pub max_steps: usize,
    pub planning_interval: usize,
    pub plot: PlotStyle,
    pub output: OutputLayout,
}

impl AgentSettings {
    pub fn from_config(cfg: &Config) -> Self {
        let model = cfg.get("DEFAULT_MODEL").unwrap_or_else(|| "gpt-4o".into());
        let vision_model = cfg.get("VISION_MODEL").unwrap_or_else(|| "gpt-4o-mini".into());
        let max_steps = cfg.usize_or("MAX_STEPS", 25);
        let planning_interval = cfg.usize_or("PLANNING_INTERVAL", 3);

        let style = cfg.get("PLOT_STYLE").unwrap_or_else(|| "default".into());
        let (width, height) = match cfg.get("FIGURE_SIZE") {
            Some(raw) => parse_figure_size(&raw).unwrap_or_else(|| {
                warn!(value = %raw, "invalid FIGURE_SIZE, using 12x8");
                (12.0, 8.0)
            }),
            None => (12.0, 8.0),
        };
        let dpi = u32::try_from(cfg.usize_or("DPI", 150)).unwrap_or(u32::MAX);

        Self {
            model,
            vision_model,
            max_steps,
            planning_interval,
            plot: PlotStyle::new(&style, width, height, dpi),
            output: OutputLayout::new(cfg.output_dir()),
        }
    }
}

/// Accepts `12x8`, `12,8` or `(12, 8)`.
fn parse_figure_size(raw: &str) -> Option<(f64, f64)> {
    let cleaned = raw.trim().trim_start_matches('(').trim_end_matches(')');
    let (w, h) = cleaned
        .split_once(|c: char| c == 'x' || c == 'X' || c == ',')?;
    let w = w.trim().parse::<f64>().ok()?;
    let h = h.trim().parse::<f64>().ok()?;
    (w > 0.0 && h > 0.0).then_some((w, h))
}

fn read_pairs(path: &Path, map: &mut HashMap<String, String>) {
    let Ok(file) = fs::File::open(path) else { return };
    let reader = BufReader::new(file);
    for line in reader.lines().map_while(|l| l.ok()) {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);
        if let Some((k, v)) = line.split_once('=') {
            map.insert(k.trim().to_string(), unquote(v.trim()).to_string());
        }
    }
}

fn unquote(v: &str) -> &str {
    for q in ['"', '\''] {
        if v.len() >= 2 && v.starts_with(q) && v.ends_with(q) {
            return &v[1..v.len() - 1];
        }
    }
    v
}

fn is_config_key(k: &str) -> bool {
    const KEYS: &[&str] = &[
        "OPENAI_API_KEY",
        "API_BASE_URL",
        "REQUEST_TIMEOUT",
        "DEFAULT_MODEL",
        "VISION_MODEL",
        "MAX_STEPS",
        "PLANNING_INTERVAL",
        "PLOT_STYLE",
        "FIGURE_SIZE",
        "DPI",
        "OUTPUT_DIR",
    ];

    KEYS.contains(&k)
}

fn default_config_path() -> PathBuf {
    let base = BaseDirs::new()
        .map(|b| b.config_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("~/.config"));
    base.join("eda_agent").join(".edarc")
}

fn default_map() -> HashMap<String, String> {
    let mut m = HashMap::new();

    // Model service
    m.insert("API_BASE_URL".into(), "default".into());
    m.insert("DEFAULT_MODEL".into(), "gpt-4o".into());
    m.insert("VISION_MODEL".into(), "gpt-4o-mini".into());
    m.insert("REQUEST_TIMEOUT".into(), "60".into());

    // Agent loop
    m.insert("MAX_STEPS".into(), "25".into());
    m.insert("PLANNING_INTERVAL".into(), "3".into());

    // Visualization
    m.insert("PLOT_STYLE".into(), "default".into());
    m.insert("FIGURE_SIZE".into(), "12x8".into());
    m.insert("DPI".into(), "150".into());
    m.insert("OUTPUT_DIR".into(), "output".into());

    m
}
