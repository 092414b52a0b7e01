//! The conversational nutrition coach.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::api::{ApiError, AppState};
use super::models::{GoalType, GoalUpdate, User, UserGoal};
use super::{timestamp, today};
use crate::llm::prompts::{self, CoachPrompt, GoalBrief};
use crate::nutrition::macros::total_macros;
use crate::nutrition::{MacroTotals, detect_foods};

pub const COACH_UNAVAILABLE: &str =
    "I'm having trouble processing your request right now. Please try again in a moment.";

pub const DEFAULT_TIMELINE_WEEKS: i64 = 12;

#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub context: Vec<String>,
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
    pub success: bool,
    pub response: String,
    pub context: Vec<String>,
    pub food_detected: bool,
    pub food_input: Option<String>,
    /// Today's totals after this message, when it mentioned food.
    pub macros: Option<MacroTotals>,
    pub user_goals: Option<UserGoal>,
    pub goal_changed: bool,
}

/// Goal a chat message asks for, if any.
pub fn goal_intent(message: &str) -> Option<GoalType> {
    let lower = message.to_lowercase();
    if lower.contains("lose weight") || lower.contains("weight loss") {
        Some(GoalType::WeightLoss)
    } else if ["gain weight", "weight gain", "increase weight"]
        .iter()
        .any(|p| lower.contains(p))
    {
        Some(GoalType::WeightGain)
    } else {
        None
    }
}

/// New goal values for `goal_type`, keeping whatever the user already set.
pub fn goal_from_chat(goal_type: GoalType, existing: Option<&UserGoal>) -> GoalUpdate {
    GoalUpdate {
        goal_type,
        target_weight: existing
            .and_then(|g| g.target_weight)
            .or_else(|| goal_type.default_target_weight()),
        current_weight: existing.and_then(|g| g.current_weight),
        timeline_weeks: existing
            .and_then(|g| g.timeline_weeks)
            .or(Some(DEFAULT_TIMELINE_WEEKS)),
    }
}

pub async fn chat(state: &AppState, user: &User, request: ChatRequest) -> Result<ChatResponse, ApiError> {
    let message = request.message.trim().to_string();
    if message.is_empty() {
        return Err(ApiError::BadRequest("Message is required".into()));
    }
    let model = state
        .catalog
        .pick_coach(request.model.as_deref())
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
        .clone();

    let user_id = user.id;
    let date = today().to_string();
    let (goal, macro_rows) = {
        let message = message.clone();
        let date = date.clone();
        state
            .db
            .call(move |db| {
                db.insert_chat_message(user_id, &message, true, &timestamp(Utc::now()))?;
                Ok((db.latest_goal(user_id)?, db.macros_for_date(user_id, &date)?))
            })
            .await?
    };
    let today_so_far = MacroTotals::sum(&macro_rows.iter().map(|m| m.totals()).collect::<Vec<_>>());

    let prompt = CoachPrompt {
        message: &message,
        context: &request.context,
        goal: goal.as_ref().map(|g| GoalBrief {
            goal_type: g.goal_type.as_str(),
            target_weight: g.target_weight,
            timeline_weeks: g.timeline_weeks,
        }),
        today: Some(today_so_far),
    };
    let reply = match state.llm.complete(prompts::coach(&model, &prompt)).await {
        Ok(reply) => reply.trim().to_string(),
        Err(e) => {
            warn!(user_id, model = %model.id, error = %e, "Coach model call failed");
            return Err(ApiError::BadGateway(COACH_UNAVAILABLE.into()));
        }
    };

    let detected = detect_foods(&message, &state.tables);
    let increment = total_macros(&detected);
    let intent = goal_intent(&message);
    let goal_update = intent.map(|g| goal_from_chat(g, goal.as_ref()));

    let (macros, user_goals) = {
        let reply = reply.clone();
        let found_food = !detected.is_empty();
        let previous_goal = goal.clone();
        state
            .db
            .call(move |db| {
                let now = timestamp(Utc::now());
                db.insert_chat_message(user_id, &reply, false, &now)?;
                let macros = if found_food {
                    db.insert_macros(user_id, &date, &increment, None, &now)?;
                    Some(today_so_far + increment)
                } else {
                    None
                };
                let goals = match &goal_update {
                    Some(update) => Some(db.upsert_goal(user_id, update, &now)?),
                    None => previous_goal,
                };
                Ok((macros, goals))
            })
            .await?
    };

    let food_detected = !detected.is_empty();
    if food_detected || intent.is_some() {
        info!(
            user_id,
            foods = detected.len(),
            goal_changed = intent.is_some(),
            "Coach message updated tracking"
        );
    }

    let mut context = request.context;
    context.push(message.clone());
    context.push(reply.clone());

    Ok(ChatResponse {
        success: true,
        response: reply,
        context,
        food_detected,
        food_input: food_detected.then_some(message),
        macros,
        user_goals,
        goal_changed: intent.is_some(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn goal(target: Option<f64>, weeks: Option<i64>) -> UserGoal {
        UserGoal {
            id: 1,
            user_id: 1,
            goal_type: GoalType::Maintenance,
            target_weight: target,
            current_weight: Some(68.0),
            timeline_weeks: weeks,
            created_at: "t".into(),
            updated_at: "t".into(),
        }
    }

    #[test]
    fn test_goal_intent_phrases() {
        assert_eq!(goal_intent("I want to LOSE WEIGHT fast"), Some(GoalType::WeightLoss));
        assert_eq!(goal_intent("tips for weight loss?"), Some(GoalType::WeightLoss));
        assert_eq!(goal_intent("help me gain weight"), Some(GoalType::WeightGain));
        assert_eq!(goal_intent("I need to increase weight"), Some(GoalType::WeightGain));
        assert_eq!(goal_intent("what should I eat?"), None);
    }

    #[test]
    fn test_goal_from_chat_uses_defaults() {
        let update = goal_from_chat(GoalType::WeightLoss, None);
        assert_eq!(update.target_weight, Some(70.0));
        assert_eq!(update.timeline_weeks, Some(12));

        let update = goal_from_chat(GoalType::WeightGain, None);
        assert_eq!(update.target_weight, Some(80.0));
    }

    #[test]
    fn test_goal_from_chat_preserves_existing_values() {
        let existing = goal(Some(62.5), Some(20));
        let update = goal_from_chat(GoalType::WeightGain, Some(&existing));
        assert_eq!(update.goal_type, GoalType::WeightGain);
        assert_eq!(update.target_weight, Some(62.5));
        assert_eq!(update.timeline_weeks, Some(20));
        assert_eq!(update.current_weight, Some(68.0));

        let partial = goal(None, None);
        let update = goal_from_chat(GoalType::WeightLoss, Some(&partial));
        assert_eq!(update.target_weight, Some(70.0));
        assert_eq!(update.timeline_weeks, Some(12));
    }
}
