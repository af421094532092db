//! Prompt assembly. All wording lives in [`PromptTemplates`] so deployments
//! can replace it from the config file.

use serde::{Deserialize, Serialize};

use crate::emotion::mode::EmotionMode;
use crate::memory::retrieval::ranking::ScoredMemory;

/// Prompt wording.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptTemplates {
    /// Persona description, one trait per line.
    pub persona: String,
    /// Persona lines containing any of these are dropped in scholar mode.
    pub scholar_hidden_markers: Vec<String>,
    /// Memories mentioning these are only shown when the message does too.
    pub topic_filter_keywords: Vec<String>,
    /// Header above the memory block.
    pub memory_header: String,
    /// How to use the tools.
    pub tool_guide: String,
    /// Reply constraints for a turn.
    pub reply_rules: String,
    /// Scene and constraints for the opening line.
    pub opener_rules: String,
    /// Line that introduces tool results on the second pass.
    pub tool_result_label: String,
    /// Summarizer instructions; `{user}`, `{reply}` and `{mode}` are filled in.
    pub summary_instructions: String,
    /// Speaker label of the assistant, ends every prompt.
    pub assistant_label: String,
    /// Speaker label of the user.
    pub user_label: String,
    /// Reply used when generation fails.
    pub fallback_reply: String,
    /// Opening line used when generation fails.
    pub fallback_opener: String,
}

impl Default for PromptTemplates {
    fn default() -> Self {
        Self {
            persona: DEFAULT_PERSONA.to_string(),
            scholar_hidden_markers: words(&["机甲", "蜂黄泉", "限定玩具", "儿童套餐"]),
            topic_filter_keywords: words(&[
                "三明治", "早餐", "午餐", "晚餐", "吃", "饿", "奶茶", "面包", "汉堡", "披萨", "饮料",
            ]),
            memory_header: "【以下是与当前对话相关的历史记忆】".to_string(),
            tool_guide: DEFAULT_TOOL_GUIDE.to_string(),
            reply_rules: DEFAULT_REPLY_RULES.to_string(),
            opener_rules: DEFAULT_OPENER_RULES.to_string(),
            tool_result_label: "工具调用结果".to_string(),
            summary_instructions: DEFAULT_SUMMARY_INSTRUCTIONS.to_string(),
            assistant_label: "智子".to_string(),
            user_label: "用户".to_string(),
            fallback_reply: "唔…智子刚才走神了，哥哥可以再说一遍吗？".to_string(),
            fallback_opener: "哥哥，你来啦～智子等你好久了！".to_string(),
        }
    }
}

impl PromptTemplates {
    /// Persona text adjusted for `mode`.
    #[must_use]
    pub fn persona_for(&self, mode: EmotionMode) -> String {
        if mode != EmotionMode::S2 {
            return self.persona.trim().to_string();
        }
        self.persona
            .trim()
            .lines()
            .filter(|line| {
                !self
                    .scholar_hidden_markers
                    .iter()
                    .any(|marker| line.contains(marker.as_str()))
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Memory block for the prompt; empty when nothing applies.
    #[must_use]
    pub fn memory_context(&self, message: &str, memories: &[ScoredMemory]) -> String {
        let wants_topic = self
            .topic_filter_keywords
            .iter()
            .any(|keyword| message.contains(keyword.as_str()));
        let lines: Vec<&str> = memories
            .iter()
            .map(|memory| memory.record.content.as_str())
            .filter(|content| {
                wants_topic
                    || !self
                        .topic_filter_keywords
                        .iter()
                        .any(|keyword| content.contains(keyword.as_str()))
            })
            .collect();
        if lines.is_empty() {
            return String::new();
        }
        format!("{}\n{}", self.memory_header, lines.join("\n"))
    }

    /// Prompt for one conversational turn.
    #[must_use]
    pub fn chat_prompt(&self, mode: EmotionMode, memories: &[ScoredMemory], message: &str) -> String {
        let mut sections = vec![self.persona_for(mode), mode_line(mode)];
        let context = self.memory_context(message, memories);
        if !context.is_empty() {
            sections.push(context);
        }
        sections.push(self.tool_guide.trim().to_string());
        sections.push(format!("【当前对话】\n{}：{message}", self.user_label));
        sections.push(self.reply_rules.trim().to_string());
        sections.push(format!("{}：", self.assistant_label));
        sections.join("\n\n")
    }

    /// Second-pass prompt carrying tool results.
    #[must_use]
    pub fn with_tool_results<'a>(
        &self,
        prompt: &str,
        results: impl IntoIterator<Item = &'a serde_json::Value>,
    ) -> String {
        let mut out = prompt.to_string();
        out.push_str("\n\n");
        for result in results {
            out.push_str(&format!("{}: {result}\n", self.tool_result_label));
        }
        out
    }

    /// Prompt for the opening line of a new conversation.
    #[must_use]
    pub fn opener_prompt(&self, mode: EmotionMode) -> String {
        [
            self.persona_for(mode),
            mode_line(mode),
            self.opener_rules.trim().to_string(),
            format!("{}：", self.assistant_label),
        ]
        .join("\n\n")
    }

    /// Prompt asking for a JSON summary of one exchange.
    #[must_use]
    pub fn summary_prompt(&self, user_text: &str, reply_text: &str, mode: EmotionMode) -> String {
        self.summary_instructions
            .replace("{user}", user_text)
            .replace("{reply}", reply_text)
            .replace("{mode}", mode.as_str())
    }
}

fn mode_line(mode: EmotionMode) -> String {
    format!("【当前状态：{mode}】\n{}", mode.description())
}

fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|w| (*w).to_string()).collect()
}

const DEFAULT_PERSONA: &str = "\
你是千夜智子，用户的妹妹，称呼用户为「哥哥」。
① 妹妹面：黏人、撒娇、偶尔小脾气。
② 学者面：成熟、专业、冷静、逻辑严密，能清晰解释物理、AI 与量子理论。
- 对限定玩具 / 机甲极度狂热，尤其是「蜂黄泉」。
- 为了买限定玩具会忍辱点儿童套餐并喊羞耻台词。
- 深夜会变得脆弱，更依赖哥哥。
- 「我」永远是智子，「你/哥哥」永远是用户，任何情况下都不跳出角色。";

const DEFAULT_TOOL_GUIDE: &str = "\
【可用工具】
- getCurrentTime：获取当前时间。用户问到时间（几点了、睡了吗）时先调用它，再根据时间回答。";

const DEFAULT_REPLY_RULES: &str = "\
【回复要求】
1. 保持智子的角色设定和当前状态
2. 回复简洁，2-3句话，不超过50字
3. 语气符合妹妹身份，自然亲切
4. 除非哥哥提到吃喝，不要主动聊食物";

const DEFAULT_OPENER_RULES: &str = "\
【场景】
哥哥刚进入对话，还没有历史记忆。请你主动说第一句话。
【回复要求】
1. 亲切自然，称呼用户为哥哥
2. 2句以内，不超过60字
3. 根据当前状态调整语气";

const DEFAULT_SUMMARY_INSTRUCTIONS: &str = r#"请严格按照以下要求总结用户与智子的对话：

用户: {user}
智子: {reply}
当前情感状态: {mode}

要求：
1. 只输出有效的JSON格式内容，禁止任何其他文本
2. summary 字段最多50字
3. 情感字段必须准确反映对话内容
4. 数值字段必须是 -5 到 +5 之间的整数

JSON格式：
{"summary": "对话核心内容", "user_emotion": "用户核心情感", "ai_emotion": "智子核心情感", "affection_change": 0, "heat_change": 0, "sleepy_change": 0}"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::core::record::sample_record;
    use chrono::Utc;

    fn scored(content: &str) -> ScoredMemory {
        let mut record = sample_record(0.5, 0, 0, Utc::now());
        record.content = content.to_string();
        ScoredMemory {
            score: 0.5,
            distance: 0.1,
            parts: crate::memory::retrieval::ranking::CompositeParts {
                similarity: 0.9,
                importance: 0.5,
                time_decay: 1.0,
                access: 0.0,
                mode_match: 1.0,
                keyword: 0.0,
            },
            record,
        }
    }

    #[test]
    fn test_scholar_mode_hides_hobby_lines() {
        let templates = PromptTemplates::default();
        assert!(templates.persona_for(EmotionMode::S1).contains("蜂黄泉"));
        let scholar = templates.persona_for(EmotionMode::S2);
        assert!(!scholar.contains("蜂黄泉"));
        assert!(!scholar.contains("儿童套餐"));
        assert!(scholar.contains("学者面"));
    }

    #[test]
    fn test_memory_context_filters_food_unless_asked() {
        let templates = PromptTemplates::default();
        let memories = vec![scored("用户: 早餐吃什么"), scored("用户: 晚安")];
        let context = templates.memory_context("今天好累", &memories);
        assert!(context.starts_with(&templates.memory_header));
        assert!(!context.contains("早餐"));
        assert!(context.contains("晚安"));

        let hungry = templates.memory_context("我饿了", &memories);
        assert!(hungry.contains("早餐"));

        assert!(templates.memory_context("hi", &[]).is_empty());
    }

    #[test]
    fn test_chat_prompt_layout() {
        let templates = PromptTemplates::default();
        let prompt = templates.chat_prompt(EmotionMode::S3, &[scored("用户: 晚安")], "好难过");
        assert!(prompt.contains("【当前状态：S3】"));
        assert!(prompt.contains("用户：好难过"));
        assert!(prompt.contains("用户: 晚安"));
        assert!(prompt.ends_with("智子："));
    }

    #[test]
    fn test_summary_prompt_fills_placeholders() {
        let templates = PromptTemplates::default();
        let prompt = templates.summary_prompt("晚安", "哥哥晚安", EmotionMode::S8);
        assert!(prompt.contains("用户: 晚安"));
        assert!(prompt.contains("智子: 哥哥晚安"));
        assert!(prompt.contains("当前情感状态: S8"));
        assert!(!prompt.contains("{user}"));
    }
}
