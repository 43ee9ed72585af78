use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};

macro_rules! status_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $text)] $variant),+
        }

        impl $name {
            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }

            pub fn from_status(value: &str) -> Option<Self> {
                match value {
                    $($text => Some($name::$variant),)+
                    _ => None,
                }
            }
        }

        impl rusqlite::types::ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<rusqlite::types::ToSqlOutput<'_>> {
                Ok(self.as_str().into())
            }
        }

        impl rusqlite::types::FromSql for $name {
            fn column_result(
                value: rusqlite::types::ValueRef<'_>,
            ) -> rusqlite::types::FromSqlResult<Self> {
                let text = value.as_str()?;
                $name::from_status(text).ok_or_else(|| {
                    rusqlite::types::FromSqlError::Other(
                        format!("unknown {} '{}'", stringify!($name), text).into(),
                    )
                })
            }
        }
    };
}

status_enum!(AgentStatus {
    Draft => "draft",
    Active => "active",
    Inactive => "inactive",
});

status_enum!(ExecutionStatus {
    Running => "running",
    Completed => "completed",
    Failed => "failed",
});

status_enum!(LogLevel {
    Info => "info",
    Warning => "warning",
    Error => "error",
    Success => "success",
});

status_enum!(ProviderKind {
    OpenAi => "openai",
    Anthropic => "anthropic",
    Custom => "custom",
});

status_enum!(ToolKind {
    Python => "python",
    JavaScript => "javascript",
    OpenApi => "openapi",
});

status_enum!(KnowledgeSource {
    File => "file",
    Url => "url",
});

status_enum!(IngestionStatus {
    Processing => "processing",
    Completed => "completed",
    Failed => "failed",
});

impl ExecutionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, ExecutionStatus::Completed | ExecutionStatus::Failed)
    }

    /// `running` moves to exactly one terminal state; terminal states are absorbing.
    pub fn can_transition_to(self, next: ExecutionStatus) -> bool {
        self == ExecutionStatus::Running && next.is_terminal()
    }
}

impl ProviderKind {
    pub fn models(self) -> Vec<String> {
        let models: &[&str] = match self {
            ProviderKind::OpenAi => &["gpt-4o", "gpt-4o-mini", "gpt-3.5-turbo", "gpt-4", "gpt-4-turbo"],
            ProviderKind::Anthropic => &["claude-3-sonnet", "claude-3-haiku", "claude-3-opus", "claude-2.1"],
            ProviderKind::Custom => &["custom-model-1", "custom-model-2"],
        };
        models.iter().map(|m| m.to_string()).collect()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: String,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiTokenRecord {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentRecord {
    pub id: String,
    #[serde(skip)]
    pub owner_id: String,
    pub name: String,
    pub description: String,
    pub provider: String,
    pub model: String,
    pub system_prompt: String,
    pub schedule: String,
    pub tools: Vec<String>,
    pub temperature: f64,
    pub status: AgentStatus,
    pub next_run: Option<DateTime<Utc>>,
    pub last_run: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRecord {
    pub id: String,
    #[serde(skip)]
    pub owner_id: String,
    pub agent_id: String,
    pub agent_name: String,
    pub execution_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub status: ExecutionStatus,
    pub duration_ms: Option<i64>,
    pub output: Option<serde_json::Value>,
    pub error: Option<String>,
    pub logs: Vec<LogEntry>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderRecord {
    pub id: String,
    #[serde(skip)]
    pub owner_id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ProviderKind,
    #[serde(serialize_with = "serialize_masked")]
    pub api_key: String,
    pub endpoint: Option<String>,
    pub is_active: bool,
    pub models: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatbotAppearance {
    pub primary_color: String,
    pub show_avatar: bool,
}

impl Default for ChatbotAppearance {
    fn default() -> Self {
        Self {
            primary_color: "#3b82f6".to_string(),
            show_avatar: true,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatbotRecord {
    pub id: String,
    #[serde(skip)]
    pub owner_id: String,
    pub name: String,
    pub description: String,
    pub provider_id: String,
    pub provider: String,
    pub model: String,
    pub system_prompt: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub welcome_message: String,
    pub appearance: ChatbotAppearance,
    pub knowledge_base: Vec<String>,
    pub tools: Vec<String>,
    pub status: AgentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolRecord {
    pub id: String,
    #[serde(skip)]
    pub owner_id: String,
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: ToolKind,
    pub code: Option<String>,
    pub open_api_spec: Option<String>,
    pub parameters: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeFileRecord {
    pub id: String,
    #[serde(skip)]
    pub owner_id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub source: KnowledgeSource,
    pub status: IngestionStatus,
    pub chunks: u32,
    pub size: Option<i64>,
    pub url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Keys are echoed as `sk-...1234`; short keys are fully hidden.
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..3].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}

fn serialize_masked<S: Serializer>(secret: &str, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&mask_secret(secret))
}
