use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }

    /// 每日测验中该难度题目的默认分值
    pub fn default_points(&self) -> u32 {
        match self {
            Difficulty::Easy => 10,
            Difficulty::Medium => 20,
            Difficulty::Hard => 30,
        }
    }
}

impl Default for Difficulty {
    fn default() -> Self {
        Difficulty::Medium
    }
}

/// 题目记录（每日测验与每日挑战共用）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuizQuestion {
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: String,
    #[serde(default)]
    pub explanation: Option<String>,
    #[serde(default = "default_subject")]
    pub subject: String,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(default)]
    pub points: u32,
}

fn default_subject() -> String {
    "General".to_string()
}

impl QuizQuestion {
    /// 正确答案必须是选项之一，且至少两个选项
    pub fn is_well_formed(&self) -> bool {
        !self.question.trim().is_empty()
            && self.options.len() >= 2
            && self
                .options
                .iter()
                .any(|opt| opt.trim() == self.correct_answer.trim())
    }

    pub fn without_answer(&self) -> PublicQuestion {
        PublicQuestion {
            question: self.question.clone(),
            options: self.options.clone(),
            subject: self.subject.clone(),
            difficulty: self.difficulty,
            points: self.points,
        }
    }
}

/// 隐藏答案后返回给挑战者的题目
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PublicQuestion {
    pub question: String,
    pub options: Vec<String>,
    pub subject: String,
    pub difficulty: Difficulty,
    pub points: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MissionStatus {
    Pending,
    Completed,
}

impl MissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MissionStatus::Pending => "pending",
            MissionStatus::Completed => "completed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(MissionStatus::Pending),
            "completed" => Some(MissionStatus::Completed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Mission {
    pub id: String,
    pub user_id: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub content_type: String,
    pub source_text: String,
    pub generated_content: Option<serde_json::Value>,
    pub status: MissionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// AI 为任务生成的学习内容
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedContent {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub key_points: Vec<String>,
    #[serde(default)]
    pub questions: Vec<QuizQuestion>,
    #[serde(default)]
    pub flashcards: Vec<Flashcard>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Flashcard {
    pub front: String,
    pub back: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DailyQuiz {
    pub id: String,
    pub quiz_date: NaiveDate,
    pub questions: Vec<QuizQuestion>,
    pub total_points: u32,
    pub subject_counts: BTreeMap<String, u32>,
    pub difficulty_counts: BTreeMap<String, u32>,
    pub is_expired: bool,
    pub created_at: DateTime<Utc>,
}

impl DailyQuiz {
    /// 根据题目列表汇总分值和学科/难度分布
    pub fn assemble(quiz_date: NaiveDate, questions: Vec<QuizQuestion>) -> Self {
        let mut subject_counts = BTreeMap::new();
        let mut difficulty_counts = BTreeMap::new();
        let mut total_points = 0;

        for q in &questions {
            *subject_counts.entry(q.subject.clone()).or_insert(0) += 1;
            *difficulty_counts
                .entry(q.difficulty.as_str().to_string())
                .or_insert(0) += 1;
            total_points += q.points;
        }

        Self {
            id: uuid::Uuid::new_v4().to_string(),
            quiz_date,
            questions,
            total_points,
            subject_counts,
            difficulty_counts,
            is_expired: false,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DailyChallenge {
    pub id: String,
    pub challenge_date: NaiveDate,
    pub questions: Vec<QuizQuestion>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl DailyChallenge {
    /// 挑战窗口为当天 00:00Z 到次日 00:00Z
    pub fn for_date(challenge_date: NaiveDate, questions: Vec<QuizQuestion>) -> Self {
        let starts_at = challenge_date.and_time(chrono::NaiveTime::MIN).and_utc();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            challenge_date,
            questions,
            starts_at,
            ends_at: starts_at + chrono::Duration::days(1),
            created_at: Utc::now(),
        }
    }

    pub fn has_ended(&self, now: DateTime<Utc>) -> bool {
        now >= self.ends_at
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnswerRecord {
    pub question_index: usize,
    pub selected_answer: String,
    pub is_correct: bool,
    pub points_awarded: u32,
    pub time_taken_ms: Option<u64>,
    pub answered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChallengeParticipant {
    pub id: String,
    pub challenge_id: String,
    pub user_id: String,
    pub display_name: Option<String>,
    pub score: u32,
    pub correct_answers: u32,
    pub questions_answered: u32,
    pub current_streak: u32,
    pub answers: Vec<AnswerRecord>,
    pub joined_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ChallengeParticipant {
    pub fn new(challenge_id: &str, user_id: &str, display_name: Option<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            challenge_id: challenge_id.to_string(),
            user_id: user_id.to_string(),
            display_name,
            score: 0,
            correct_answers: 0,
            questions_answered: 0,
            current_streak: 0,
            answers: Vec::new(),
            joined_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn has_answered(&self, question_index: usize) -> bool {
        self.answers.iter().any(|a| a.question_index == question_index)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MomentKind {
    Streak,
    TookLead,
    PerfectRound,
}

impl MomentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MomentKind::Streak => "streak",
            MomentKind::TookLead => "took_lead",
            MomentKind::PerfectRound => "perfect_round",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "streak" => Some(MomentKind::Streak),
            "took_lead" => Some(MomentKind::TookLead),
            "perfect_round" => Some(MomentKind::PerfectRound),
            _ => None,
        }
    }
}

/// 挑战中的高光时刻，只追加不修改
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TournamentMoment {
    pub id: String,
    pub challenge_id: String,
    pub user_id: String,
    pub kind: MomentKind,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LeaderboardEntry {
    pub rank: u32,
    pub user_id: String,
    pub display_name: Option<String>,
    pub score: u32,
    pub correct_answers: u32,
    pub questions_answered: u32,
    pub completed: bool,
}
