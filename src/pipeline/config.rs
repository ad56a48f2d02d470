use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context};

use crate::backend::openai::{OpenAiSettings, DEFAULT_API_KEY_ENV, DEFAULT_BASE_URL, DEFAULT_MODEL};
use crate::backend::{LanguagePair, Preset};
use crate::config::{load_config, locate_config, AppConfig, CONFIG_FILENAME};
use crate::pipeline::batch::DEFAULT_OUTPUT_SUFFIX;
use crate::pipeline::invoker::RetryPolicy;
use crate::pipeline::prompts::{default_prompt_files, PromptSet, DEFAULT_PROMPTS_DIR};
use crate::pipeline::table::TableMode;
use crate::pipeline::translator::{TranslateOptions, DEFAULT_CHUNK_SIZE};
use crate::textutil::DEFAULT_ECHO_MARKERS;

/// Command-line values that take precedence over the config file.
#[derive(Clone, Debug, Default)]
pub struct Overrides {
    pub config_path: Option<PathBuf>,
    pub preset: Option<Preset>,
    pub source_lang: Option<String>,
    pub target_lang: Option<String>,
    pub locale: Option<String>,
    pub chunk_size: Option<usize>,
    pub table_mode: Option<TableMode>,
    pub no_autosave: bool,
    pub trace: bool,
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub no_reflect: bool,
}

#[derive(Clone, Debug)]
pub struct PipelineConfig {
    pub config_path: Option<PathBuf>,
    pub languages: LanguagePair,
    pub options: TranslateOptions,
    pub output_suffix: String,
    /// Set when tracing is on.
    pub trace_dir: Option<PathBuf>,
    pub backend: OpenAiSettings,
    pub prompts: PromptSet,
}

impl PipelineConfig {
    /// Merges CLI overrides, the config file (if any) and defaults.
    pub fn resolve(workdir: &Path, ov: &Overrides) -> anyhow::Result<Self> {
        let cfg_file = locate_config(ov.config_path.as_deref(), workdir);
        let mut file_cfg = AppConfig::default();
        if let Some(p) = cfg_file.as_ref() {
            if p.exists() {
                file_cfg = load_config(p)?;
            } else if ov.config_path.is_some() {
                return Err(anyhow!("config file not found: {}", p.display()));
            }
        }
        let cfg_file = cfg_file.filter(|p| p.exists());
        let config_dir = cfg_file
            .as_deref()
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .unwrap_or_else(|| workdir.to_path_buf());
        Self::from_parts(file_cfg, cfg_file, &config_dir, workdir, ov)
    }

    pub fn from_parts(
        file_cfg: AppConfig,
        config_path: Option<PathBuf>,
        config_dir: &Path,
        workdir: &Path,
        ov: &Overrides,
    ) -> anyhow::Result<Self> {
        let p = &file_cfg.pipeline;

        let base = ov.preset.map(Preset::languages).unwrap_or_default();
        let pick = |cli: &Option<String>, file: &Option<String>, default: &str| {
            cli.clone()
                .or_else(|| if ov.preset.is_some() { None } else { file.clone() })
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| default.to_string())
        };
        let languages = LanguagePair {
            source_lang: pick(&ov.source_lang, &p.source_lang, &base.source_lang),
            target_lang: pick(&ov.target_lang, &p.target_lang, &base.target_lang),
            locale: pick(&ov.locale, &p.locale, &base.locale),
        };

        let chunk_size = ov.chunk_size.or(p.chunk_size).unwrap_or(DEFAULT_CHUNK_SIZE);
        if chunk_size == 0 {
            return Err(anyhow!("chunk_size must be at least 1"));
        }

        let table_mode = match (ov.table_mode, p.table_mode.as_deref()) {
            (Some(m), _) => m,
            (None, Some(s)) => TableMode::parse(s)
                .ok_or_else(|| anyhow!("unknown table_mode: {s} (per_cell | whole_table | skip)"))?,
            (None, None) => TableMode::default(),
        };

        let echo_markers = p
            .echo_markers
            .clone()
            .unwrap_or_else(|| DEFAULT_ECHO_MARKERS.iter().map(|m| m.to_string()).collect());

        let retry = RetryPolicy {
            max_retries: p.max_retries.unwrap_or(RetryPolicy::default().max_retries),
            backoff: p
                .retry_backoff_ms
                .map(Duration::from_millis)
                .unwrap_or(RetryPolicy::default().backoff),
        };

        let autosave = !ov.no_autosave && p.autosave.unwrap_or(true);
        let output_suffix = p
            .output_suffix
            .clone()
            .unwrap_or_else(|| DEFAULT_OUTPUT_SUFFIX.to_string());

        let trace_on = ov.trace || p.trace.unwrap_or(false);
        let trace_dir = trace_on.then(|| {
            let dir = PathBuf::from(p.trace_dir.clone().unwrap_or_else(|| "_trace".to_string()));
            if dir.is_absolute() {
                dir
            } else {
                workdir.join(dir)
            }
        });

        let b = &file_cfg.backend;
        let defaults = OpenAiSettings::default();
        let backend = OpenAiSettings {
            base_url: ov
                .base_url
                .clone()
                .or_else(|| b.base_url.clone())
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            model: ov
                .model
                .clone()
                .or_else(|| b.model.clone())
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            api_key_env: b
                .api_key_env
                .clone()
                .unwrap_or_else(|| DEFAULT_API_KEY_ENV.to_string()),
            timeout: b
                .timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            temperature: b.temperature.unwrap_or(defaults.temperature),
            max_tokens: b.max_tokens,
            reflect: !ov.no_reflect && b.reflect.unwrap_or(defaults.reflect),
        };

        let prompts = PromptSet::load(config_dir, &file_cfg.prompts).context("load prompts")?;

        Ok(Self {
            config_path,
            languages,
            options: TranslateOptions {
                chunk_size,
                table_mode,
                autosave,
                echo_markers,
                retry,
            },
            output_suffix,
            trace_dir,
            backend,
            prompts,
        })
    }
}

/// Writes a commented config and the prompt templates into `dir`. Existing files are
/// kept unless `force`.
pub fn init_default_config(dir: &Path, force: bool) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("create config dir: {}", dir.display()))?;
    let cfg_path = dir.join(CONFIG_FILENAME);
    if cfg_path.exists() && !force {
        return Err(anyhow!(
            "config already exists: {} (use --force to overwrite)",
            cfg_path.display()
        ));
    }

    let prompts_dir = dir.join(DEFAULT_PROMPTS_DIR);
    std::fs::create_dir_all(&prompts_dir)
        .with_context(|| format!("create prompts dir: {}", prompts_dir.display()))?;
    for (fname, body) in default_prompt_files() {
        let p = prompts_dir.join(fname);
        if p.exists() && !force {
            continue;
        }
        std::fs::write(&p, body).with_context(|| format!("write prompt: {}", p.display()))?;
    }

    std::fs::write(&cfg_path, DEFAULT_CONFIG_TOML)
        .with_context(|| format!("write config: {}", cfg_path.display()))?;
    Ok(cfg_path)
}

const DEFAULT_CONFIG_TOML: &str = r#"[pipeline]
source_lang = "English"
target_lang = "Chinese"
# Country/region whose register the translation follows.
locale = "China"

# Paragraphs per backend call.
chunk_size = 25
# per_cell | whole_table | skip
table_mode = "per_cell"
# Output lines containing any of these are dropped as instruction echoes.
echo_markers = ["TRANSLATION", "TRANSLATE"]

max_retries = 2
# Doubled on every further retry.
retry_backoff_ms = 500

# Rewrite the output after every chunk.
autosave = true
output_suffix = "_translated"

trace = false
trace_dir = "_trace"

[backend]
base_url = "https://api.openai.com/v1"
model = "gpt-4o-mini"
api_key_env = "OPENAI_API_KEY"
timeout_secs = 120
temperature = 0.3
# max_tokens = 4096
# Initial translation, then a critique, then an improved translation.
reflect = true

[prompts]
initial = "prompts/initial.txt"
reflect = "prompts/reflect.txt"
improve = "prompts/improve.txt"
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;

    fn resolve(cfg: &str, ov: &Overrides) -> anyhow::Result<PipelineConfig> {
        PipelineConfig::from_parts(
            parse_config(cfg).unwrap(),
            None,
            Path::new("."),
            Path::new("/work"),
            ov,
        )
    }

    #[test]
    fn defaults_without_file() {
        let c = resolve("", &Overrides::default()).unwrap();
        assert_eq!(c.languages, LanguagePair::new("English", "Chinese", "China"));
        assert_eq!(c.options.chunk_size, 25);
        assert_eq!(c.options.table_mode, TableMode::PerCell);
        assert!(c.options.autosave);
        assert_eq!(c.options.retry, RetryPolicy::default());
        assert_eq!(c.output_suffix, "_translated");
        assert!(c.trace_dir.is_none());
        assert!(c.backend.reflect);
    }

    #[test]
    fn cli_beats_file_beats_default() {
        let file = r#"
[pipeline]
target_lang = "French"
locale = "France"
chunk_size = 50
table_mode = "whole_table"
trace = true

[backend]
model = "file-model"
reflect = true
"#;
        let ov = Overrides {
            chunk_size: Some(10),
            model: Some("cli-model".into()),
            no_reflect: true,
            no_autosave: true,
            ..Default::default()
        };
        let c = resolve(file, &ov).unwrap();
        assert_eq!(c.languages.target_lang, "French");
        assert_eq!(c.languages.locale, "France");
        assert_eq!(c.options.chunk_size, 10);
        assert_eq!(c.options.table_mode, TableMode::WholeTable);
        assert!(!c.options.autosave);
        assert_eq!(c.trace_dir, Some(PathBuf::from("/work/_trace")));
        assert_eq!(c.backend.model, "cli-model");
        assert!(!c.backend.reflect);
    }

    #[test]
    fn preset_replaces_file_languages() {
        let file = "[pipeline]\nsource_lang = \"German\"\n";
        let ov = Overrides {
            preset: Some(Preset::ZhEn),
            ..Default::default()
        };
        let c = resolve(file, &ov).unwrap();
        assert_eq!(c.languages, LanguagePair::new("Chinese", "English", "United States"));

        let ov = Overrides {
            preset: Some(Preset::ZhEn),
            locale: Some("Canada".into()),
            ..Default::default()
        };
        assert_eq!(resolve("", &ov).unwrap().languages.locale, "Canada");
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(resolve("[pipeline]\nchunk_size = 0\n", &Overrides::default()).is_err());
        assert!(resolve("[pipeline]\ntable_mode = \"rows\"\n", &Overrides::default()).is_err());
    }

    #[test]
    fn init_writes_loadable_config_and_refuses_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = init_default_config(dir.path(), false).unwrap();
        assert!(dir.path().join("prompts/initial.txt").exists());

        let ov = Overrides {
            config_path: Some(path.clone()),
            ..Default::default()
        };
        let c = PipelineConfig::resolve(dir.path(), &ov).unwrap();
        assert_eq!(c.config_path, Some(path));
        assert_eq!(c.options.echo_markers, vec!["TRANSLATION", "TRANSLATE"]);

        assert!(init_default_config(dir.path(), false).is_err());
        assert!(init_default_config(dir.path(), true).is_ok());
    }

    #[test]
    fn explicit_missing_config_is_an_error() {
        let ov = Overrides {
            config_path: Some(PathBuf::from("/nonexistent/docx-translator.toml")),
            ..Default::default()
        };
        assert!(PipelineConfig::resolve(Path::new("."), &ov).is_err());
    }
}
