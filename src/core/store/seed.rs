use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use tracing::info;

use super::types::{
    AgentRecord, AgentStatus, ChatbotAppearance, ChatbotRecord, ExecutionRecord, ExecutionStatus,
    IngestionStatus, KnowledgeFileRecord, KnowledgeSource, LogEntry, LogLevel, ProviderKind,
    ProviderRecord, ToolKind, ToolRecord,
};
use super::{Store, now_millis};
use crate::core::schedule;

pub const DEMO_USER_ID: &str = "user-1";

fn days_ago(now: DateTime<Utc>, days: i64) -> DateTime<Utc> {
    now - Duration::days(days)
}

fn entry(at: DateTime<Utc>, level: LogLevel, message: &str) -> LogEntry {
    LogEntry {
        timestamp: at,
        level,
        message: message.to_string(),
    }
}

impl Store {
    /// Populate an empty database with the demo workspace. Returns false when
    /// any user already exists.
    pub async fn seed_demo(&self) -> Result<bool> {
        if self.has_any_users().await? {
            return Ok(false);
        }
        let now = now_millis();
        let owner = DEMO_USER_ID.to_string();

        self.insert_user(DEMO_USER_ID, "Demo User", "demo@neural.ai").await?;
        self.insert_user("user-2", "Admin User", "admin@neural.ai").await?;

        for (id, name, kind, key, age) in [
            ("provider-1", "OpenAI GPT-4", ProviderKind::OpenAi, "sk-demo-key-12345", 7),
            ("provider-2", "Anthropic Claude", ProviderKind::Anthropic, "sk-ant-demo-key-67890", 5),
        ] {
            self.insert_provider(&ProviderRecord {
                id: id.into(),
                owner_id: owner.clone(),
                name: name.into(),
                kind,
                api_key: key.into(),
                endpoint: None,
                is_active: true,
                models: kind.models(),
                created_at: days_ago(now, age),
                updated_at: now,
            })
            .await?;
        }

        self.insert_chatbot(&ChatbotRecord {
            id: "chatbot-1".into(),
            owner_id: owner.clone(),
            name: "Customer Support Bot".into(),
            description: "AI-powered customer support assistant that helps users with common questions and issues".into(),
            provider_id: "provider-1".into(),
            provider: "OpenAI GPT-4".into(),
            model: "gpt-4o".into(),
            system_prompt: "You are a helpful customer support assistant. Be friendly, professional, and provide accurate information.".into(),
            temperature: 0.7,
            max_tokens: 1000,
            welcome_message: "Hello! I'm here to help you with any questions or issues you might have. How can I assist you today?".into(),
            appearance: ChatbotAppearance::default(),
            knowledge_base: vec!["knowledge-1".into(), "knowledge-2".into()],
            tools: vec!["tool-1".into()],
            status: AgentStatus::Active,
            created_at: days_ago(now, 3),
            updated_at: now,
        })
        .await?;
        self.insert_chatbot(&ChatbotRecord {
            id: "chatbot-2".into(),
            owner_id: owner.clone(),
            name: "Sales Assistant".into(),
            description: "AI sales assistant that helps qualify leads and provides product information".into(),
            provider_id: "provider-2".into(),
            provider: "Anthropic Claude".into(),
            model: "claude-3-sonnet".into(),
            system_prompt: "You are a knowledgeable sales assistant. Focus on understanding customer needs and matching them with appropriate solutions.".into(),
            temperature: 0.8,
            max_tokens: 1200,
            welcome_message: "Welcome! I'm here to help you find the perfect solution for your needs. What brings you here today?".into(),
            appearance: ChatbotAppearance {
                primary_color: "#10b981".into(),
                show_avatar: true,
            },
            knowledge_base: vec!["knowledge-3".into()],
            tools: Vec::new(),
            status: AgentStatus::Active,
            created_at: days_ago(now, 1),
            updated_at: now,
        })
        .await?;

        self.insert_agent(&AgentRecord {
            id: "agent-1".into(),
            owner_id: owner.clone(),
            name: "Daily Report Generator".into(),
            description: "Automatically generates daily analytics reports and sends them to stakeholders".into(),
            provider: "OpenAI GPT-4".into(),
            model: "gpt-4o".into(),
            system_prompt: "You are an AI agent responsible for generating comprehensive daily reports.".into(),
            schedule: "0 9 * * *".into(),
            tools: vec!["tool-2".into(), "tool-3".into()],
            temperature: 0.3,
            status: AgentStatus::Active,
            next_run: schedule::next_run("0 9 * * *"),
            last_run: Some(now - Duration::hours(2) + Duration::seconds(45)),
            created_at: days_ago(now, 5),
            updated_at: now,
        })
        .await?;
        self.insert_agent(&AgentRecord {
            id: "agent-2".into(),
            owner_id: owner.clone(),
            name: "Content Moderator".into(),
            description: "Monitors user-generated content and flags inappropriate material".into(),
            provider: "Anthropic Claude".into(),
            model: "claude-3-haiku".into(),
            system_prompt: "You are a content moderation agent. Review submitted content for policy violations.".into(),
            schedule: "*/15 * * * *".into(),
            tools: vec!["tool-1".into()],
            temperature: 0.2,
            status: AgentStatus::Active,
            next_run: schedule::next_run("*/15 * * * *"),
            last_run: Some(now - Duration::minutes(30) + Duration::seconds(8)),
            created_at: days_ago(now, 2),
            updated_at: now,
        })
        .await?;

        let tools = [
            (
                "tool-1",
                "Weather Checker",
                "Get current weather information for any city worldwide",
                ToolKind::Python,
                "def get_weather(city: str) -> dict:\n    return {\"city\": city, \"condition\": \"Sunny\"}",
                json!({"city": {"type": "string", "description": "The name of the city to get weather for", "required": true}}),
                4,
            ),
            (
                "tool-2",
                "Email Sender",
                "Send emails with custom content and attachments",
                ToolKind::JavaScript,
                "async function sendEmail(to, subject, body) {\n    return { success: true };\n}",
                json!({
                    "to": {"type": "string", "description": "Recipient email address", "required": true},
                    "subject": {"type": "string", "description": "Email subject line", "required": true},
                    "body": {"type": "string", "description": "Email body content", "required": true}
                }),
                3,
            ),
            (
                "tool-3",
                "Data Analyzer",
                "Analyze datasets and generate insights",
                ToolKind::Python,
                "def analyze_data(data: list) -> dict:\n    return {\"total_records\": len(data)}",
                json!({"data": {"type": "array", "description": "Dataset to analyze (array of objects)", "required": true}}),
                2,
            ),
        ];
        for (id, name, description, kind, code, parameters, age) in tools {
            self.insert_tool(&ToolRecord {
                id: id.into(),
                owner_id: owner.clone(),
                name: name.into(),
                description: description.into(),
                kind,
                code: Some(code.into()),
                open_api_spec: None,
                parameters,
                created_at: days_ago(now, age),
                updated_at: now,
            })
            .await?;
        }

        let knowledge = [
            ("knowledge-1", "Company FAQ.pdf", KnowledgeSource::File, 45, Some(2_048_576), None, 6),
            ("knowledge-2", "Product Documentation.md", KnowledgeSource::File, 78, Some(1_572_864), None, 4),
            (
                "knowledge-3",
                "Sales Playbook",
                KnowledgeSource::Url,
                32,
                None,
                Some("https://example.com/sales-playbook"),
                3,
            ),
        ];
        for (id, name, source, chunks, size, url, age) in knowledge {
            self.insert_knowledge_file(&KnowledgeFileRecord {
                id: id.into(),
                owner_id: owner.clone(),
                name: name.into(),
                source,
                status: IngestionStatus::Completed,
                chunks,
                size,
                url: url.map(str::to_string),
                created_at: days_ago(now, age),
                updated_at: days_ago(now, age),
            })
            .await?;
        }

        let report_start = now - Duration::hours(2);
        self.insert_execution_record(&ExecutionRecord {
            id: "log-1".into(),
            owner_id: owner.clone(),
            agent_id: "agent-1".into(),
            agent_name: "Daily Report Generator".into(),
            execution_id: "exec-1".into(),
            start_time: report_start,
            end_time: Some(report_start + Duration::seconds(45)),
            status: ExecutionStatus::Completed,
            duration_ms: Some(45_000),
            output: Some(json!({
                "reportGenerated": true,
                "recordsProcessed": 1247,
                "recipientsSent": 5,
                "reportUrl": "https://reports.neural.ai/daily-2024-01-15.pdf"
            })),
            error: None,
            logs: vec![
                entry(report_start, LogLevel::Info, "Agent execution started"),
                entry(report_start + Duration::seconds(10), LogLevel::Info, "Fetching analytics data from database"),
                entry(report_start + Duration::seconds(30), LogLevel::Info, "Processing 1,247 conversation records"),
                entry(report_start + Duration::seconds(45), LogLevel::Success, "Daily report generated and sent successfully"),
            ],
        })
        .await?;

        let moderation_start = now - Duration::minutes(30);
        self.insert_execution_record(&ExecutionRecord {
            id: "log-2".into(),
            owner_id: owner,
            agent_id: "agent-2".into(),
            agent_name: "Content Moderator".into(),
            execution_id: "exec-2".into(),
            start_time: moderation_start,
            end_time: Some(moderation_start + Duration::seconds(8)),
            status: ExecutionStatus::Completed,
            duration_ms: Some(8_000),
            output: Some(json!({
                "submissionsScanned": 23,
                "approved": 21,
                "flagged": 2,
                "rejected": 0
            })),
            error: None,
            logs: vec![
                entry(moderation_start, LogLevel::Info, "Content moderation cycle started"),
                entry(moderation_start + Duration::seconds(3), LogLevel::Info, "Scanning 23 new submissions"),
                entry(moderation_start + Duration::seconds(6), LogLevel::Warning, "Flagged 2 submissions for manual review"),
                entry(moderation_start + Duration::seconds(8), LogLevel::Success, "Content moderation completed"),
            ],
        })
        .await?;

        info!("Seeded demo workspace for {}", DEMO_USER_ID);
        Ok(true)
    }
}
