// 数据库服务模块
// 提供 SQLite 持久化：学习任务、每日测验、每日挑战、参赛者与高光时刻

use anyhow::{anyhow, Context, Result};
use chrono::{NaiveDate, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::models::{
    ChallengeParticipant, DailyChallenge, DailyQuiz, Mission, MissionStatus, MomentKind,
    TournamentMoment,
};
use crate::utils::ensure_parent_dir;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS missions (
        id TEXT PRIMARY KEY,
        user_id TEXT,
        title TEXT NOT NULL,
        description TEXT,
        content_type TEXT NOT NULL,
        source_text TEXT NOT NULL,
        generated_content TEXT,
        status TEXT NOT NULL CHECK(status IN ('pending', 'completed')),
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_missions_user ON missions(user_id);

    CREATE TABLE IF NOT EXISTS daily_quizzes (
        id TEXT PRIMARY KEY,
        quiz_date TEXT NOT NULL UNIQUE,
        questions TEXT NOT NULL,
        total_points INTEGER NOT NULL DEFAULT 0,
        subject_counts TEXT NOT NULL,
        difficulty_counts TEXT NOT NULL,
        is_expired INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS daily_challenges (
        id TEXT PRIMARY KEY,
        challenge_date TEXT NOT NULL UNIQUE,
        questions TEXT NOT NULL,
        starts_at TEXT NOT NULL,
        ends_at TEXT NOT NULL,
        created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS challenge_participants (
        id TEXT PRIMARY KEY,
        challenge_id TEXT NOT NULL,
        user_id TEXT NOT NULL,
        display_name TEXT,
        score INTEGER NOT NULL DEFAULT 0,
        correct_answers INTEGER NOT NULL DEFAULT 0,
        questions_answered INTEGER NOT NULL DEFAULT 0,
        current_streak INTEGER NOT NULL DEFAULT 0,
        answers TEXT NOT NULL DEFAULT '[]',
        joined_at TEXT NOT NULL,
        completed_at TEXT,
        UNIQUE(challenge_id, user_id),
        FOREIGN KEY (challenge_id) REFERENCES daily_challenges(id) ON DELETE CASCADE
    );

    CREATE INDEX IF NOT EXISTS idx_participants_score
        ON challenge_participants(challenge_id, score DESC);

    CREATE TABLE IF NOT EXISTS tournament_moments (
        id TEXT PRIMARY KEY,
        challenge_id TEXT NOT NULL,
        user_id TEXT NOT NULL,
        kind TEXT NOT NULL,
        description TEXT NOT NULL,
        created_at TEXT NOT NULL,
        FOREIGN KEY (challenge_id) REFERENCES daily_challenges(id) ON DELETE CASCADE
    );

    CREATE INDEX IF NOT EXISTS idx_moments_challenge ON tournament_moments(challenge_id);
";

const MISSION_COLUMNS: &str = "id, user_id, title, description, content_type, source_text,
     generated_content, status, created_at, updated_at";

const QUIZ_COLUMNS: &str = "id, quiz_date, questions, total_points, subject_counts,
     difficulty_counts, is_expired, created_at";

const CHALLENGE_COLUMNS: &str = "id, challenge_date, questions, starts_at, ends_at, created_at";

const PARTICIPANT_COLUMNS: &str = "id, challenge_id, user_id, display_name, score, correct_answers,
     questions_answered, current_streak, answers, joined_at, completed_at";

/// 数据库服务
pub struct DatabaseService {
    pool: Arc<Mutex<Connection>>,
    db_path: Option<PathBuf>,
}

impl DatabaseService {
    /// 打开（或创建）数据库文件
    pub fn open(path: &Path) -> Result<Self> {
        ensure_parent_dir(path)?;
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database {}", path.display()))?;
        Self::from_connection(conn, Some(path.to_path_buf()))
    }

    /// 内存数据库（测试用）
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Self::from_connection(conn, None)
    }

    fn from_connection(conn: Connection, db_path: Option<PathBuf>) -> Result<Self> {
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            ",
        )
        .context("Failed to set database pragmas")?;

        let service = Self {
            pool: Arc::new(Mutex::new(conn)),
            db_path,
        };
        service.initialize()?;
        Ok(service)
    }

    /// 初始化数据库表结构
    pub fn initialize(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute_batch(SCHEMA).context("Failed to create tables")?;
        Ok(())
    }

    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.pool
            .lock()
            .map_err(|_| anyhow!("Database connection lock poisoned"))
    }

    /// 在 IMMEDIATE 事务中执行，闭包返回 Err 时回滚
    pub fn transaction<T, E, F>(&self, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&Transaction<'_>) -> std::result::Result<T, E>,
        E: From<anyhow::Error>,
    {
        let mut conn = self.conn()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .context("Failed to start transaction")?;
        let value = f(&tx)?;
        tx.commit().context("Failed to commit transaction")?;
        Ok(value)
    }

    // ==================== 学习任务 ====================

    /// 创建学习任务
    pub fn create_mission(&self, mission: &Mission) -> Result<()> {
        let conn = self.conn()?;
        let generated = mission
            .generated_content
            .as_ref()
            .map(to_json)
            .transpose()?;

        conn.execute(
            "INSERT INTO missions
             (id, user_id, title, description, content_type, source_text,
              generated_content, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            rusqlite::params![
                mission.id,
                mission.user_id,
                mission.title,
                mission.description,
                mission.content_type,
                mission.source_text,
                generated,
                mission.status.as_str(),
                mission.created_at,
                mission.updated_at,
            ],
        )
        .context("Failed to insert mission")?;

        Ok(())
    }

    /// 获取学习任务
    pub fn get_mission(&self, id: &str) -> Result<Option<Mission>> {
        let conn = self.conn()?;
        conn.query_row(
            &format!("SELECT {} FROM missions WHERE id = ?1", MISSION_COLUMNS),
            [id],
            Self::row_to_mission,
        )
        .optional()
        .context("Failed to load mission")
    }

    /// 列出学习任务，按创建时间倒序
    pub fn list_missions(&self, user_id: Option<&str>, limit: u32) -> Result<Vec<Mission>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM missions
             WHERE (?1 IS NULL OR user_id = ?1)
             ORDER BY created_at DESC, rowid DESC LIMIT ?2",
            MISSION_COLUMNS
        ))?;

        let rows = stmt.query_map(rusqlite::params![user_id, limit], Self::row_to_mission)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to list missions")
    }

    /// 写入生成内容，仅当任务仍为 pending 时生效
    pub fn complete_mission(&self, id: &str, content: &serde_json::Value) -> Result<bool> {
        let conn = self.conn()?;
        let changed = conn
            .execute(
                "UPDATE missions SET generated_content = ?1, status = ?2, updated_at = ?3
                 WHERE id = ?4 AND status = ?5",
                rusqlite::params![
                    to_json(content)?,
                    MissionStatus::Completed.as_str(),
                    Utc::now(),
                    id,
                    MissionStatus::Pending.as_str(),
                ],
            )
            .context("Failed to update mission")?;
        Ok(changed == 1)
    }

    // ==================== 每日测验 ====================

    pub fn get_daily_quiz(&self, date: NaiveDate) -> Result<Option<DailyQuiz>> {
        let conn = self.conn()?;
        conn.query_row(
            &format!("SELECT {} FROM daily_quizzes WHERE quiz_date = ?1", QUIZ_COLUMNS),
            [date],
            Self::row_to_daily_quiz,
        )
        .optional()
        .context("Failed to load daily quiz")
    }

    /// 插入当天测验；同日期已存在时保留旧记录
    ///
    /// 返回库中的记录以及本次是否插入。
    pub fn insert_daily_quiz_if_absent(&self, quiz: &DailyQuiz) -> Result<(DailyQuiz, bool)> {
        let inserted = {
            let conn = self.conn()?;
            conn.execute(
                "INSERT INTO daily_quizzes
                 (id, quiz_date, questions, total_points, subject_counts,
                  difficulty_counts, is_expired, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(quiz_date) DO NOTHING",
                rusqlite::params![
                    quiz.id,
                    quiz.quiz_date,
                    to_json(&quiz.questions)?,
                    quiz.total_points,
                    to_json(&quiz.subject_counts)?,
                    to_json(&quiz.difficulty_counts)?,
                    quiz.is_expired,
                    quiz.created_at,
                ],
            )
            .context("Failed to insert daily quiz")?
                == 1
        };

        let stored = self
            .get_daily_quiz(quiz.quiz_date)?
            .ok_or_else(|| anyhow!("Daily quiz for {} vanished after insert", quiz.quiz_date))?;
        Ok((stored, inserted))
    }

    /// 将指定日期之前的测验标记为过期
    pub fn expire_daily_quizzes(&self, before: NaiveDate) -> Result<usize> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE daily_quizzes SET is_expired = 1 WHERE quiz_date < ?1 AND is_expired = 0",
            [before],
        )
        .context("Failed to expire daily quizzes")
    }

    // ==================== 每日挑战 ====================

    pub fn get_challenge(&self, id: &str) -> Result<Option<DailyChallenge>> {
        let conn = self.conn()?;
        load_challenge(&conn, id).context("Failed to load challenge")
    }

    pub fn get_challenge_by_date(&self, date: NaiveDate) -> Result<Option<DailyChallenge>> {
        let conn = self.conn()?;
        conn.query_row(
            &format!(
                "SELECT {} FROM daily_challenges WHERE challenge_date = ?1",
                CHALLENGE_COLUMNS
            ),
            [date],
            row_to_challenge,
        )
        .optional()
        .context("Failed to load challenge")
    }

    /// 插入当天挑战；同日期已存在时保留旧记录
    pub fn insert_challenge_if_absent(
        &self,
        challenge: &DailyChallenge,
    ) -> Result<(DailyChallenge, bool)> {
        let inserted = {
            let conn = self.conn()?;
            conn.execute(
                "INSERT INTO daily_challenges
                 (id, challenge_date, questions, starts_at, ends_at, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(challenge_date) DO NOTHING",
                rusqlite::params![
                    challenge.id,
                    challenge.challenge_date,
                    to_json(&challenge.questions)?,
                    challenge.starts_at,
                    challenge.ends_at,
                    challenge.created_at,
                ],
            )
            .context("Failed to insert challenge")?
                == 1
        };

        let stored = self
            .get_challenge_by_date(challenge.challenge_date)?
            .ok_or_else(|| {
                anyhow!("Challenge for {} vanished after insert", challenge.challenge_date)
            })?;
        Ok((stored, inserted))
    }

    /// 加入挑战；重复加入返回已有记录
    pub fn join_challenge(
        &self,
        participant: &ChallengeParticipant,
    ) -> Result<(ChallengeParticipant, bool)> {
        let conn = self.conn()?;
        let inserted = conn
            .execute(
                "INSERT INTO challenge_participants
                 (id, challenge_id, user_id, display_name, score, correct_answers,
                  questions_answered, current_streak, answers, joined_at, completed_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                 ON CONFLICT(challenge_id, user_id) DO NOTHING",
                rusqlite::params![
                    participant.id,
                    participant.challenge_id,
                    participant.user_id,
                    participant.display_name,
                    participant.score,
                    participant.correct_answers,
                    participant.questions_answered,
                    participant.current_streak,
                    to_json(&participant.answers)?,
                    participant.joined_at,
                    participant.completed_at,
                ],
            )
            .context("Failed to insert participant")?
            == 1;

        let stored = load_participant(&conn, &participant.challenge_id, &participant.user_id)?
            .ok_or_else(|| anyhow!("Participant vanished after insert"))?;
        Ok((stored, inserted))
    }

    pub fn get_participant(
        &self,
        challenge_id: &str,
        user_id: &str,
    ) -> Result<Option<ChallengeParticipant>> {
        let conn = self.conn()?;
        load_participant(&conn, challenge_id, user_id).context("Failed to load participant")
    }

    /// 排行榜：分数、答对数降序，同分先加入者在前
    pub fn leaderboard(&self, challenge_id: &str, limit: u32) -> Result<Vec<ChallengeParticipant>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM challenge_participants
             WHERE challenge_id = ?1
             ORDER BY score DESC, correct_answers DESC, joined_at ASC
             LIMIT ?2",
            PARTICIPANT_COLUMNS
        ))?;

        let rows = stmt.query_map(rusqlite::params![challenge_id, limit], row_to_participant)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to load leaderboard")
    }

    /// 高光时刻，最新在前
    pub fn list_moments(&self, challenge_id: &str, limit: u32) -> Result<Vec<TournamentMoment>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, challenge_id, user_id, kind, description, created_at
             FROM tournament_moments WHERE challenge_id = ?1
             ORDER BY created_at DESC, rowid DESC LIMIT ?2",
        )?;

        let rows = stmt.query_map(rusqlite::params![challenge_id, limit], |row| {
            let kind: String = row.get(3)?;
            Ok(TournamentMoment {
                id: row.get(0)?,
                challenge_id: row.get(1)?,
                user_id: row.get(2)?,
                kind: MomentKind::parse(&kind)
                    .ok_or_else(|| conversion_error(3, format!("unknown moment kind '{}'", kind)))?,
                description: row.get(4)?,
                created_at: row.get(5)?,
            })
        })?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to load moments")
    }

    // ==================== 辅助方法 ====================

    fn row_to_mission(row: &Row) -> rusqlite::Result<Mission> {
        let status: String = row.get(7)?;
        let generated: Option<String> = row.get(6)?;
        Ok(Mission {
            id: row.get(0)?,
            user_id: row.get(1)?,
            title: row.get(2)?,
            description: row.get(3)?,
            content_type: row.get(4)?,
            source_text: row.get(5)?,
            generated_content: match generated {
                Some(raw) => Some(
                    serde_json::from_str(&raw)
                        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(6, Type::Text, Box::new(e)))?,
                ),
                None => None,
            },
            status: MissionStatus::parse(&status)
                .ok_or_else(|| conversion_error(7, format!("unknown mission status '{}'", status)))?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }

    fn row_to_daily_quiz(row: &Row) -> rusqlite::Result<DailyQuiz> {
        Ok(DailyQuiz {
            id: row.get(0)?,
            quiz_date: row.get(1)?,
            questions: json_column(row, 2)?,
            total_points: row.get(3)?,
            subject_counts: json_column(row, 4)?,
            difficulty_counts: json_column(row, 5)?,
            is_expired: row.get(6)?,
            created_at: row.get(7)?,
        })
    }
}

// 以下函数接受 &Connection，事务内同样可用

pub(crate) fn load_challenge(
    conn: &Connection,
    id: &str,
) -> rusqlite::Result<Option<DailyChallenge>> {
    conn.query_row(
        &format!("SELECT {} FROM daily_challenges WHERE id = ?1", CHALLENGE_COLUMNS),
        [id],
        row_to_challenge,
    )
    .optional()
}

pub(crate) fn load_participant(
    conn: &Connection,
    challenge_id: &str,
    user_id: &str,
) -> rusqlite::Result<Option<ChallengeParticipant>> {
    conn.query_row(
        &format!(
            "SELECT {} FROM challenge_participants WHERE challenge_id = ?1 AND user_id = ?2",
            PARTICIPANT_COLUMNS
        ),
        [challenge_id, user_id],
        row_to_participant,
    )
    .optional()
}

/// 其他参赛者的最高分
pub(crate) fn top_rival_score(
    conn: &Connection,
    challenge_id: &str,
    user_id: &str,
) -> rusqlite::Result<Option<u32>> {
    conn.query_row(
        "SELECT MAX(score) FROM challenge_participants WHERE challenge_id = ?1 AND user_id != ?2",
        [challenge_id, user_id],
        |row| row.get(0),
    )
}

/// 按主键写回参赛者的计分与答题记录
pub(crate) fn save_participant(
    conn: &Connection,
    participant: &ChallengeParticipant,
) -> Result<()> {
    conn.execute(
        "UPDATE challenge_participants
         SET score = ?1, correct_answers = ?2, questions_answered = ?3,
             current_streak = ?4, answers = ?5, completed_at = ?6
         WHERE id = ?7",
        rusqlite::params![
            participant.score,
            participant.correct_answers,
            participant.questions_answered,
            participant.current_streak,
            to_json(&participant.answers)?,
            participant.completed_at,
            participant.id,
        ],
    )
    .context("Failed to update participant")?;
    Ok(())
}

pub(crate) fn insert_moment(conn: &Connection, moment: &TournamentMoment) -> Result<()> {
    conn.execute(
        "INSERT INTO tournament_moments (id, challenge_id, user_id, kind, description, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![
            moment.id,
            moment.challenge_id,
            moment.user_id,
            moment.kind.as_str(),
            moment.description,
            moment.created_at,
        ],
    )
    .context("Failed to insert moment")?;
    Ok(())
}

fn row_to_challenge(row: &Row) -> rusqlite::Result<DailyChallenge> {
    Ok(DailyChallenge {
        id: row.get(0)?,
        challenge_date: row.get(1)?,
        questions: json_column(row, 2)?,
        starts_at: row.get(3)?,
        ends_at: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn row_to_participant(row: &Row) -> rusqlite::Result<ChallengeParticipant> {
    Ok(ChallengeParticipant {
        id: row.get(0)?,
        challenge_id: row.get(1)?,
        user_id: row.get(2)?,
        display_name: row.get(3)?,
        score: row.get(4)?,
        correct_answers: row.get(5)?,
        questions_answered: row.get(6)?,
        current_streak: row.get(7)?,
        answers: json_column(row, 8)?,
        joined_at: row.get(9)?,
        completed_at: row.get(10)?,
    })
}

fn json_column<T: DeserializeOwned>(row: &Row, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn conversion_error(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, message.into())
}

fn to_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).context("Failed to serialize column")
}
