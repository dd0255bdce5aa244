//! 每日挑战：加入、答题计分、高光时刻
//!
//! 计分是纯函数 [`apply_answer`]，读-改-写在一个事务内完成。

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use super::database::{
    insert_moment, load_challenge, load_participant, save_participant, top_rival_score,
};
use super::DatabaseService;
use crate::models::{
    AnswerRecord, ChallengeParticipant, LeaderboardEntry, MomentKind, QuizQuestion,
    TournamentMoment,
};

/// 每答对一题的得分
pub const POINTS_PER_CORRECT: u32 = 10;

/// 触发连胜时刻的连对次数
const STREAK_MILESTONES: [u32; 3] = [3, 5, 10];

#[derive(Debug, Error)]
pub enum ChallengeError {
    /// 请求本身不合法（400）
    #[error("{0}")]
    Invalid(String),
    /// 存储失败（500）
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl ChallengeError {
    fn invalid(message: &str) -> Self {
        ChallengeError::Invalid(message.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct AnswerSubmission {
    pub challenge_id: String,
    pub user_id: String,
    pub question_index: usize,
    pub selected_answer: String,
    pub time_taken_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnswerOutcome {
    pub is_correct: bool,
    pub correct_answer: String,
    pub explanation: Option<String>,
    pub points_awarded: u32,
    pub participant: ChallengeParticipant,
    pub moments: Vec<TournamentMoment>,
}

/// 加入挑战，重复加入返回已有记录
pub fn join_challenge(
    db: &DatabaseService,
    challenge_id: &str,
    user_id: &str,
    display_name: Option<String>,
    now: DateTime<Utc>,
) -> Result<(ChallengeParticipant, bool), ChallengeError> {
    let challenge = db
        .get_challenge(challenge_id)?
        .ok_or_else(|| ChallengeError::invalid("Challenge not found"))?;
    if challenge.has_ended(now) {
        return Err(ChallengeError::invalid("Challenge has ended"));
    }

    let participant = ChallengeParticipant::new(challenge_id, user_id, display_name);
    Ok(db.join_challenge(&participant)?)
}

/// 提交答案
pub fn submit_answer(
    db: &DatabaseService,
    submission: &AnswerSubmission,
    now: DateTime<Utc>,
) -> Result<AnswerOutcome, ChallengeError> {
    db.transaction(|tx| {
        let challenge = load_challenge(tx, &submission.challenge_id)
            .context("Failed to load challenge")?
            .ok_or_else(|| ChallengeError::invalid("Challenge not found"))?;
        if challenge.has_ended(now) {
            return Err(ChallengeError::invalid("Challenge has ended"));
        }

        let question = challenge
            .questions
            .get(submission.question_index)
            .ok_or_else(|| ChallengeError::invalid("Invalid question index"))?;

        let mut participant =
            load_participant(tx, &submission.challenge_id, &submission.user_id)
                .context("Failed to load participant")?
                .ok_or_else(|| ChallengeError::invalid("Participant not found"))?;
        if participant.has_answered(submission.question_index) {
            return Err(ChallengeError::invalid("Question already answered"));
        }

        let rival_score = top_rival_score(tx, &participant.challenge_id, &participant.user_id)
            .context("Failed to load rival score")?;
        let previous_score = participant.score;
        let record = apply_answer(
            &mut participant,
            question,
            submission,
            challenge.questions.len(),
            now,
        );
        let moments = detect_moments(&participant, &record, previous_score, rival_score, now);

        save_participant(tx, &participant)?;
        for moment in &moments {
            insert_moment(tx, moment)?;
        }

        Ok(AnswerOutcome {
            is_correct: record.is_correct,
            correct_answer: question.correct_answer.clone(),
            explanation: question.explanation.clone(),
            points_awarded: record.points_awarded,
            participant,
            moments,
        })
    })
}

/// 判分并更新参赛者，返回追加的答题记录
pub fn apply_answer(
    participant: &mut ChallengeParticipant,
    question: &QuizQuestion,
    submission: &AnswerSubmission,
    total_questions: usize,
    now: DateTime<Utc>,
) -> AnswerRecord {
    let is_correct = submission.selected_answer.trim() == question.correct_answer.trim();
    let points_awarded = if is_correct { POINTS_PER_CORRECT } else { 0 };

    if is_correct {
        participant.score += points_awarded;
        participant.correct_answers += 1;
        participant.current_streak += 1;
    } else {
        participant.current_streak = 0;
    }
    participant.questions_answered += 1;

    let record = AnswerRecord {
        question_index: submission.question_index,
        selected_answer: submission.selected_answer.clone(),
        is_correct,
        points_awarded,
        time_taken_ms: submission.time_taken_ms,
        answered_at: now,
    };
    participant.answers.push(record.clone());

    if participant.completed_at.is_none() && participant.answers.len() >= total_questions {
        participant.completed_at = Some(now);
    }

    record
}

/// 根据本次答题结果生成高光时刻
///
/// `rival_score` 为其他参赛者的最高分，没有对手时不产生领先时刻。
pub fn detect_moments(
    participant: &ChallengeParticipant,
    record: &AnswerRecord,
    previous_score: u32,
    rival_score: Option<u32>,
    now: DateTime<Utc>,
) -> Vec<TournamentMoment> {
    let name = participant
        .display_name
        .as_deref()
        .unwrap_or(&participant.user_id);
    let mut moments = Vec::new();

    if !record.is_correct {
        return moments;
    }

    if STREAK_MILESTONES.contains(&participant.current_streak) {
        moments.push(moment(
            participant,
            MomentKind::Streak,
            format!("{} is on a {}-answer streak", name, participant.current_streak),
            now,
        ));
    }

    if let Some(rival) = rival_score {
        if participant.score > rival && previous_score <= rival {
            moments.push(moment(
                participant,
                MomentKind::TookLead,
                format!("{} took the lead with {} points", name, participant.score),
                now,
            ));
        }
    }

    let finished_now = participant.completed_at == Some(record.answered_at);
    if finished_now && participant.correct_answers as usize == participant.answers.len() {
        moments.push(moment(
            participant,
            MomentKind::PerfectRound,
            format!("{} finished with a perfect round", name),
            now,
        ));
    }

    moments
}

fn moment(
    participant: &ChallengeParticipant,
    kind: MomentKind,
    description: String,
    now: DateTime<Utc>,
) -> TournamentMoment {
    TournamentMoment {
        id: uuid::Uuid::new_v4().to_string(),
        challenge_id: participant.challenge_id.clone(),
        user_id: participant.user_id.clone(),
        kind,
        description,
        created_at: now,
    }
}

/// 排行榜名次从 1 开始
pub fn rank_entries(participants: Vec<ChallengeParticipant>) -> Vec<LeaderboardEntry> {
    participants
        .into_iter()
        .enumerate()
        .map(|(i, p)| LeaderboardEntry {
            rank: i as u32 + 1,
            completed: p.completed_at.is_some(),
            user_id: p.user_id,
            display_name: p.display_name,
            score: p.score,
            correct_answers: p.correct_answers,
            questions_answered: p.questions_answered,
        })
        .collect()
}
