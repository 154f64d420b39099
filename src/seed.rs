//! One-time start-up tasks. Each runs at most once per database; completion
//! is recorded in the `migrations` table only after the task succeeds.

use std::collections::HashSet;

use crate::database::{Database, DatabaseError};
use crate::models::{Field, FieldType, FieldUpdate, GoalDirection, ViewConfiguration};

pub const DEFAULT_FIELDS_TASK: &str = "default-fields";
pub const GOAL_DIRECTION_TASK: &str = "goal-direction";
pub const DEFAULT_VIEW_CONFIGS_TASK: &str = "default-view-configs";

pub const DEFAULT_FIELDS: [(&str, &str); 10] = [
    ("KFA", "%"),
    ("Knochenmasse", "%"),
    ("Muskelmasse", "%"),
    ("Wasseranteil", "%"),
    ("Gewicht", "kg"),
    ("Bauch", "cm"),
    ("Taille", "cm"),
    ("Nacken", "cm"),
    ("Brustumfang", "cm"),
    ("Bizepsumfang", "cm"),
];

const BODY_COMPOSITION_FIELDS: [&str; 5] = ["KFA", "Knochenmasse", "Muskelmasse", "Wasseranteil", "Gewicht"];

const LOWER_IS_BETTER: [&str; 8] = ["gewicht", "weight", "fett", "fat", "körperfett", "kfa", "bf", "body fat"];

/// Guess a goal direction from a field name
pub fn guess_goal_direction(name: &str) -> GoalDirection {
    let lower = name.to_lowercase();
    if LOWER_IS_BETTER.iter().any(|needle| lower.contains(needle)) {
        GoalDirection::Decrease
    } else {
        GoalDirection::Increase
    }
}

/// Run every start-up task that has not completed yet
pub fn run_startup_tasks(db: &Database) -> Result<(), DatabaseError> {
    run_once(db, DEFAULT_FIELDS_TASK, create_default_fields)?;
    run_once(db, GOAL_DIRECTION_TASK, migrate_goal_direction)?;
    run_once(db, DEFAULT_VIEW_CONFIGS_TASK, create_default_view_configs)?;
    Ok(())
}

/// Returns whether the task ran
fn run_once(
    db: &Database,
    name: &str,
    task: fn(&Database) -> Result<usize, DatabaseError>,
) -> Result<bool, DatabaseError> {
    if db.is_migration_applied(name)? {
        return Ok(false);
    }
    let changed = task(db)?;
    db.mark_migration_applied(name)?;
    tracing::info!(task = name, changed, "start-up task applied");
    Ok(true)
}

/// Create the default numeric fields whose names don't exist yet
pub fn create_default_fields(db: &Database) -> Result<usize, DatabaseError> {
    let existing = db.get_all_fields()?;
    let mut names: HashSet<String> = existing.iter().map(|f| f.name.to_lowercase()).collect();
    let mut order = db.get_max_field_order()? + 1;
    let mut created = 0;

    for (name, unit) in DEFAULT_FIELDS {
        if !names.insert(name.to_lowercase()) {
            continue;
        }
        let lower = name.to_lowercase();
        let mut field = Field::new(name.to_string(), unit.to_string(), FieldType::Number);
        field.order = order;
        field.goal_direction = Some(
            if lower.contains("gewicht") || lower.contains("fett") || lower.contains("kfa") {
                GoalDirection::Decrease
            } else {
                GoalDirection::Increase
            },
        );
        db.insert_field(&field)?;
        order += 1;
        created += 1;
    }

    Ok(created)
}

/// Give every field without a goal direction one guessed from its name
pub fn migrate_goal_direction(db: &Database) -> Result<usize, DatabaseError> {
    let mut migrated = 0;
    for field in db.get_all_fields()? {
        if field.goal_direction.is_some() {
            continue;
        }
        let goal = guess_goal_direction(&field.name);
        db.update_field(&field.id, &FieldUpdate { goal_direction: Some(goal), ..Default::default() })?;
        tracing::debug!(field = %field.name, goal = goal.as_str(), "goal direction set");
        migrated += 1;
    }
    Ok(migrated)
}

/// Create the "Körperzusammensetzung" view over whichever body composition
/// fields exist. Nothing is created when none of them do.
pub fn create_default_view_configs(db: &Database) -> Result<usize, DatabaseError> {
    let fields = db.get_all_fields()?;
    let field_ids: Vec<String> = BODY_COMPOSITION_FIELDS
        .iter()
        .filter_map(|wanted| {
            fields
                .iter()
                .find(|f| f.name.to_lowercase() == wanted.to_lowercase())
                .map(|f| f.id.clone())
        })
        .collect();

    if field_ids.is_empty() {
        return Ok(0);
    }

    let mut config = ViewConfiguration::new("Körperzusammensetzung".to_string(), field_ids);
    config.description = Some("Übersicht über Körperfett, Muskeln und Gewicht".to_string());
    config.icon = Some("🧬".to_string());
    config.order = db.get_max_view_config_order()? + 1;
    config.is_default = true;
    db.insert_view_config(&config)?;
    Ok(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_startup_tasks_run_once() {
        let db = Database::open_in_memory().unwrap();
        run_startup_tasks(&db).unwrap();
        assert_eq!(db.count_fields().unwrap(), 10);
        assert_eq!(db.get_all_view_configs().unwrap().len(), 1);

        // a second start changes nothing, even after the user deleted fields
        let first = db.get_all_fields().unwrap()[0].clone();
        db.delete_field(&first.id).unwrap();
        run_startup_tasks(&db).unwrap();
        assert_eq!(db.count_fields().unwrap(), 9);
        assert_eq!(db.get_all_view_configs().unwrap().len(), 1);
    }

    #[test]
    fn test_default_fields_skip_existing_names() {
        let db = Database::open_in_memory().unwrap();
        let mut own = Field::new("gewicht".to_string(), "lb".to_string(), FieldType::Number);
        own.order = 0;
        db.insert_field(&own).unwrap();

        assert_eq!(create_default_fields(&db).unwrap(), 9);
        let fields = db.get_all_fields().unwrap();
        assert_eq!(fields[0].unit, "lb");
        let orders: Vec<i64> = fields.iter().map(|f| f.order).collect();
        assert_eq!(orders, (0..10).collect::<Vec<_>>());
        let kfa = fields.iter().find(|f| f.name == "KFA").unwrap();
        assert_eq!(kfa.goal(), GoalDirection::Decrease);
        let bizeps = fields.iter().find(|f| f.name == "Bizepsumfang").unwrap();
        assert_eq!(bizeps.goal(), GoalDirection::Increase);
    }

    #[test]
    fn test_goal_direction_migration() {
        let db = Database::open_in_memory().unwrap();
        let weight = Field::new("Body Weight".to_string(), "kg".to_string(), FieldType::Number);
        let mut chest = Field::new("Brust".to_string(), "cm".to_string(), FieldType::Number);
        chest.order = 1;
        let mut preset = Field::new("Fettmasse".to_string(), "kg".to_string(), FieldType::Number);
        preset.order = 2;
        preset.goal_direction = Some(GoalDirection::Increase);
        for f in [&weight, &chest, &preset] {
            db.insert_field(f).unwrap();
        }

        assert_eq!(migrate_goal_direction(&db).unwrap(), 2);
        assert_eq!(db.get_field(&weight.id).unwrap().unwrap().goal_direction, Some(GoalDirection::Decrease));
        assert_eq!(db.get_field(&chest.id).unwrap().unwrap().goal_direction, Some(GoalDirection::Increase));
        // explicit choices are left alone
        assert_eq!(db.get_field(&preset.id).unwrap().unwrap().goal_direction, Some(GoalDirection::Increase));
    }

    #[test]
    fn test_no_default_view_without_matching_fields() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(create_default_view_configs(&db).unwrap(), 0);
        assert!(db.get_all_view_configs().unwrap().is_empty());
    }
}
