//! Read-compute-write for one user's achievements.
//!
//! [`recompute`] runs on a caller-owned connection so a meal write and the
//! recomputation it triggers commit or roll back together. The user row is
//! locked first, which serializes concurrent recomputations per user.

use std::collections::HashMap;

use serde::Serialize;
use sqlx::PgConnection;
use time::Date;
use tracing::{debug, info, instrument, warn};

use super::{
    catalog::{AchievementDefinition, Evaluation},
    repo,
    stats::ActivitySnapshot,
};
use crate::{
    db,
    email,
    error::{AppError, AppResult},
    state::AppState,
    users::repo::Goals,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EarnedAchievement {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub badge_icon: String,
    pub badge_color: String,
}

impl From<&AchievementDefinition> for EarnedAchievement {
    fn from(d: &AchievementDefinition) -> Self {
        Self {
            id: d.id,
            name: d.name.clone(),
            description: d.description.clone(),
            badge_icon: d.badge_icon.clone(),
            badge_color: d.badge_color.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RecomputeOutcome {
    pub evaluated: usize,
    pub newly_earned: Vec<EarnedAchievement>,
}

/// Scores every definition against the snapshot. Definitions without a rule
/// are skipped.
pub fn evaluate_all<'a>(
    definitions: &'a [AchievementDefinition],
    snapshot: &ActivitySnapshot,
) -> Vec<(&'a AchievementDefinition, Evaluation)> {
    definitions
        .iter()
        .filter_map(|d| match d.evaluate(snapshot) {
            Ok(e) => Some((d, e)),
            Err(reason) => {
                warn!(achievement_id = d.id, name = %d.name, %reason, "skipping achievement");
                None
            }
        })
        .collect()
}

/// Achievements earned now that were not earned before.
pub fn newly_earned(
    previous: &HashMap<i64, bool>,
    scored: &[(&AchievementDefinition, Evaluation)],
) -> Vec<EarnedAchievement> {
    scored
        .iter()
        .filter(|(d, e)| e.is_earned() && !previous.get(&d.id).copied().unwrap_or(false))
        .map(|(d, _)| EarnedAchievement::from(*d))
        .collect()
}

#[instrument(skip(conn))]
pub async fn recompute(conn: &mut PgConnection, user_id: i64, today: Date) -> AppResult<RecomputeOutcome> {
    let goals = Goals::lock_for_update(&mut *conn, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;

    let definitions = repo::active_definitions(&mut *conn).await?;
    let days = repo::daily_totals(&mut *conn, user_id).await?;
    let previous = repo::earned_flags(&mut *conn, user_id).await?;

    let snapshot = ActivitySnapshot::build(goals, &days, today);
    let scored = evaluate_all(&definitions, &snapshot);

    let mut log_entries = Vec::with_capacity(scored.len());
    for (definition, evaluation) in &scored {
        let progress = evaluation.progress();
        repo::upsert_progress(&mut *conn, user_id, definition.id, progress).await?;
        log_entries.push((definition.id, progress));
    }
    repo::log_progress(&mut *conn, user_id, today, &log_entries).await?;

    let outcome = RecomputeOutcome {
        evaluated: scored.len(),
        newly_earned: newly_earned(&previous, &scored),
    };
    debug!(
        user_id,
        evaluated = outcome.evaluated,
        newly_earned = outcome.newly_earned.len(),
        streak = snapshot.current_streak(),
        "achievements recomputed"
    );
    Ok(outcome)
}

/// Recomputes in its own transaction, then sends notifications.
#[instrument(skip(state))]
pub async fn sync_user(state: &AppState, user_id: i64) -> AppResult<RecomputeOutcome> {
    let mut tx = state.db.begin().await?;
    let outcome = recompute(&mut *tx, user_id, db::today()).await?;
    tx.commit().await?;
    announce(state, user_id, &outcome);
    Ok(outcome)
}

/// Fires notification emails for newly earned achievements. Call only after
/// the recompute transaction has committed.
pub fn announce(state: &AppState, user_id: i64, outcome: &RecomputeOutcome) {
    if outcome.newly_earned.is_empty() {
        return;
    }
    for earned in &outcome.newly_earned {
        info!(user_id, achievement_id = earned.id, name = %earned.name, "achievement earned");
    }
    let state = state.clone();
    let earned = outcome.newly_earned.clone();
    tokio::spawn(async move {
        email::notify::achievements_unlocked(&state, user_id, &earned).await;
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::achievements::{catalog::fixtures, stats::DayTotals};
    use time::{macros::date, Duration};

    const GOALS: Goals = Goals {
        calorie_goal: 2000.0,
        protein_goal: 100.0,
    };

    fn snapshot_for(days: &[(i64, f64, f64)]) -> ActivitySnapshot {
        let today = date!(2024 - 06 - 30);
        let rows: Vec<DayTotals> = days
            .iter()
            .map(|(back, c, p)| DayTotals {
                day: today - Duration::days(*back),
                calories: *c,
                protein: *p,
            })
            .collect();
        ActivitySnapshot::build(GOALS, &rows, today)
    }

    fn percentages(scored: &[(&AchievementDefinition, Evaluation)]) -> Vec<(i64, f64)> {
        scored.iter().map(|(d, e)| (d.id, e.progress())).collect()
    }

    #[test]
    fn definitions_without_rule_are_skipped() {
        let mut defs = fixtures::seeded();
        defs[0].metric = "steps".into();
        let scored = evaluate_all(&defs, &snapshot_for(&[]));
        assert_eq!(scored.len(), defs.len() - 1);
        assert!(scored.iter().all(|(d, _)| d.id != defs[0].id));
    }

    #[test]
    fn different_logs_give_different_progress() {
        let defs = fixtures::seeded();
        let heavy = snapshot_for(&[(0, 2200.0, 120.0), (1, 2100.0, 110.0), (2, 2000.0, 100.0)]);
        let light = snapshot_for(&[(0, 500.0, 20.0)]);
        let a = percentages(&evaluate_all(&defs, &heavy));
        let b = percentages(&evaluate_all(&defs, &light));
        assert_ne!(a, b);
        // the light user's inputs do not leak into the heavy user's scores
        assert_eq!(a, percentages(&evaluate_all(&defs, &heavy)));
    }

    #[test]
    fn only_transitions_count_as_newly_earned() {
        let defs = fixtures::seeded();
        let snapshot = snapshot_for(&[(0, 2000.0, 100.0)]);
        let scored = evaluate_all(&defs, &snapshot);

        let first = newly_earned(&HashMap::new(), &scored);
        let names: Vec<&str> = first.iter().map(|e| e.name.as_str()).collect();
        assert!(names.contains(&"Daily Calorie Goal"));
        assert!(names.contains(&"Balanced Day"));
        assert!(names.contains(&"First Goal"));
        assert!(!names.contains(&"3-Day Streak"));

        let previous: HashMap<i64, bool> = first.iter().map(|e| (e.id, true)).collect();
        assert!(newly_earned(&previous, &scored).is_empty());
    }

    mod stored {
        use std::sync::Arc;

        use sqlx::PgPool;
        use time::OffsetDateTime;
        use tokio::sync::Barrier;

        use super::super::*;
        use crate::{db::testing::insert_user, meals::repo::{self as meals, NewMeal}};

        type StoredRow = (i64, f64, bool, Option<OffsetDateTime>);

        fn meal(calories: f64, protein: f64) -> NewMeal {
            NewMeal {
                meal_text: "test meal".into(),
                calories,
                protein,
                fat: 0.0,
                carbs: 0.0,
                fiber: 0.0,
                meal_date: db::today(),
            }
        }

        async fn log_meal(pool: &PgPool, user_id: i64, calories: f64, protein: f64) -> RecomputeOutcome {
            let mut tx = pool.begin().await.unwrap();
            meals::insert(&mut *tx, user_id, &meal(calories, protein)).await.unwrap();
            let outcome = recompute(&mut *tx, user_id, db::today()).await.unwrap();
            tx.commit().await.unwrap();
            outcome
        }

        async fn rows(pool: &PgPool, user_id: i64) -> Vec<StoredRow> {
            sqlx::query_as::<_, StoredRow>(
                "SELECT achievement_id, current_progress, is_earned, earned_at \
                 FROM user_achievements WHERE user_id = $1 ORDER BY achievement_id",
            )
            .bind(user_id)
            .fetch_all(pool)
            .await
            .unwrap()
        }

        async fn log_count(pool: &PgPool, user_id: i64) -> i64 {
            sqlx::query_scalar("SELECT COUNT(*) FROM achievement_progress_log WHERE user_id = $1")
                .bind(user_id)
                .fetch_one(pool)
                .await
                .unwrap()
        }

        async fn achievement_id(pool: &PgPool, name: &str) -> i64 {
            sqlx::query_scalar("SELECT id FROM achievements WHERE name = $1")
                .bind(name)
                .fetch_one(pool)
                .await
                .unwrap()
        }

        #[sqlx::test]
        async fn meal_for_one_user_leaves_other_users_rows_alone(pool: PgPool) {
            let ann = insert_user(&pool, "ann@example.com", 2000.0, 100.0).await;
            let bob = insert_user(&pool, "bob@example.com", 2000.0, 100.0).await;

            let bob_outcome = log_meal(&pool, bob, 500.0, 20.0).await;
            assert!(bob_outcome.newly_earned.is_empty());
            let bob_before = rows(&pool, bob).await;
            assert_eq!(bob_before.len(), bob_outcome.evaluated);
            assert_eq!(log_count(&pool, bob).await, bob_outcome.evaluated as i64);

            let ann_outcome = log_meal(&pool, ann, 2000.0, 100.0).await;
            let names: Vec<&str> = ann_outcome.newly_earned.iter().map(|e| e.name.as_str()).collect();
            assert!(names.contains(&"Balanced Day"));
            assert!(names.contains(&"First Goal"));

            assert_eq!(rows(&pool, bob).await, bob_before);
            assert_eq!(log_count(&pool, bob).await, bob_outcome.evaluated as i64);
            assert_ne!(rows(&pool, ann).await, bob_before);

            let again = log_meal(&pool, ann, 100.0, 5.0).await;
            assert!(again.newly_earned.is_empty());
        }

        #[sqlx::test]
        async fn earned_at_tracks_earned_transitions(pool: PgPool) {
            let user = insert_user(&pool, "ann@example.com", 2000.0, 100.0).await;
            let first_goal = achievement_id(&pool, "First Goal").await;
            let mut conn = pool.acquire().await.unwrap();
            let row = |rows: Vec<StoredRow>| rows.into_iter().find(|r| r.0 == first_goal).unwrap();

            repo::upsert_progress(&mut conn, user, first_goal, 1.0).await.unwrap();
            let (_, _, earned, stamped) = row(rows(&pool, user).await);
            assert!(earned);
            let stamped = stamped.unwrap();

            repo::upsert_progress(&mut conn, user, first_goal, 1.0).await.unwrap();
            assert_eq!(row(rows(&pool, user).await).3, Some(stamped));

            repo::upsert_progress(&mut conn, user, first_goal, 0.4).await.unwrap();
            let (_, progress, earned, cleared) = row(rows(&pool, user).await);
            assert_eq!(progress, 0.4);
            assert!(!earned);
            assert_eq!(cleared, None);

            repo::upsert_progress(&mut conn, user, first_goal, 1.0).await.unwrap();
            let (_, _, earned, restamped) = row(rows(&pool, user).await);
            assert!(earned);
            assert!(restamped.unwrap() >= stamped);
        }

        #[sqlx::test]
        async fn unknown_user_is_not_found(pool: PgPool) {
            let mut tx = pool.begin().await.unwrap();
            let err = recompute(&mut *tx, 424_242, db::today()).await.unwrap_err();
            assert!(matches!(err, AppError::NotFound(_)));
        }

        #[sqlx::test]
        async fn concurrent_meal_logs_for_one_user_both_commit(pool: PgPool) {
            let user = insert_user(&pool, "ann@example.com", 2000.0, 100.0).await;
            let barrier = Arc::new(Barrier::new(2));

            // both inserts land before either recompute takes the user lock
            let run = move |pool: PgPool, barrier: Arc<Barrier>| async move {
                let mut tx = pool.begin().await?;
                meals::insert(&mut *tx, user, &meal(1000.0, 50.0)).await?;
                barrier.wait().await;
                recompute(&mut *tx, user, db::today()).await?;
                tx.commit().await?;
                Ok::<_, AppError>(())
            };
            let (a, b) = tokio::join!(
                tokio::spawn(run(pool.clone(), barrier.clone())),
                tokio::spawn(run(pool.clone(), barrier.clone())),
            );
            a.unwrap().unwrap();
            b.unwrap().unwrap();

            let daily = achievement_id(&pool, "Daily Calorie Goal").await;
            let stored = rows(&pool, user).await;
            let (_, progress, earned, _) = stored.into_iter().find(|r| r.0 == daily).unwrap();
            assert_eq!(progress, 1.0);
            assert!(earned);
        }
    }

    #[test]
    fn recompute_is_deterministic_for_same_input() {
        let defs = fixtures::seeded();
        let snapshot = snapshot_for(&[(0, 1800.0, 90.0), (3, 2500.0, 130.0)]);
        assert_eq!(
            percentages(&evaluate_all(&defs, &snapshot)),
            percentages(&evaluate_all(&defs, &snapshot))
        );
    }
}
