use serde::Serialize;
use sqlx::{FromRow, PgPool};

use super::lookup::Nutrients;

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct Food {
    pub id: i64,
    pub name: String,
    pub calories_per_100g: f64,
    pub protein_per_100g: f64,
    pub fat_per_100g: f64,
    pub carbs_per_100g: f64,
    pub fiber_per_100g: f64,
}

const FOOD_COLUMNS: &str =
    "id, name, calories_per_100g, protein_per_100g, fat_per_100g, carbs_per_100g, fiber_per_100g";

/// Escapes LIKE wildcards so user input only matches literally.
pub fn like_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Exact name first; otherwise substring matches, prefix matches and
/// shorter names ranked first.
pub async fn search(db: &PgPool, query: &str, limit: i64) -> anyhow::Result<Vec<Food>> {
    let term = query.trim().to_lowercase();
    if term.is_empty() {
        return Ok(Vec::new());
    }

    let exact = sqlx::query_as::<_, Food>(&format!(
        "SELECT {FOOD_COLUMNS} FROM nutrition_foods WHERE LOWER(name) = $1 LIMIT $2"
    ))
    .bind(&term)
    .bind(limit)
    .fetch_all(db)
    .await?;
    if !exact.is_empty() {
        return Ok(exact);
    }

    let escaped = like_escape(&term);
    let rows = sqlx::query_as::<_, Food>(&format!(
        r#"
        SELECT {FOOD_COLUMNS}
        FROM nutrition_foods
        WHERE LOWER(name) LIKE $1 ESCAPE '\'
        ORDER BY CASE WHEN LOWER(name) LIKE $2 ESCAPE '\' THEN 1 ELSE 2 END, LENGTH(name), name
        LIMIT $3
        "#
    ))
    .bind(format!("%{}%", escaped))
    .bind(format!("{}%", escaped))
    .bind(limit)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

/// Validated input for adding or editing a food.
#[derive(Debug, Clone, PartialEq)]
pub struct NewFood {
    pub name: String,
    pub per_100g: Nutrients,
}

/// The whole table by name, capped at `limit` rows.
pub async fn list_all(db: &PgPool, limit: i64) -> anyhow::Result<Vec<Food>> {
    let rows = sqlx::query_as::<_, Food>(&format!(
        "SELECT {FOOD_COLUMNS} FROM nutrition_foods ORDER BY name LIMIT $1"
    ))
    .bind(limit)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

/// Id of another food whose name matches `name` ignoring case.
pub async fn name_taken(db: &PgPool, name: &str, except_id: Option<i64>) -> anyhow::Result<Option<i64>> {
    let id = sqlx::query_scalar::<_, i64>(
        "SELECT id FROM nutrition_foods WHERE LOWER(name) = LOWER($1) AND id IS DISTINCT FROM $2 LIMIT 1",
    )
    .bind(name)
    .bind(except_id)
    .fetch_optional(db)
    .await?;
    Ok(id)
}

pub async fn insert(db: &PgPool, food: &NewFood) -> sqlx::Result<Food> {
    sqlx::query_as::<_, Food>(&format!(
        r#"
        INSERT INTO nutrition_foods (name, calories_per_100g, protein_per_100g, fat_per_100g,
                                     carbs_per_100g, fiber_per_100g)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING {FOOD_COLUMNS}
        "#
    ))
    .bind(&food.name)
    .bind(food.per_100g.calories)
    .bind(food.per_100g.protein)
    .bind(food.per_100g.fat)
    .bind(food.per_100g.carbs)
    .bind(food.per_100g.fiber)
    .fetch_one(db)
    .await
}

pub async fn update(db: &PgPool, id: i64, food: &NewFood) -> sqlx::Result<Option<Food>> {
    sqlx::query_as::<_, Food>(&format!(
        r#"
        UPDATE nutrition_foods
           SET name = $2, calories_per_100g = $3, protein_per_100g = $4, fat_per_100g = $5,
               carbs_per_100g = $6, fiber_per_100g = $7
         WHERE id = $1
        RETURNING {FOOD_COLUMNS}
        "#
    ))
    .bind(id)
    .bind(&food.name)
    .bind(food.per_100g.calories)
    .bind(food.per_100g.protein)
    .bind(food.per_100g.fat)
    .bind(food.per_100g.carbs)
    .bind(food.per_100g.fiber)
    .fetch_optional(db)
    .await
}

pub async fn delete(db: &PgPool, id: i64) -> anyhow::Result<Option<Food>> {
    let food = sqlx::query_as::<_, Food>(&format!(
        "DELETE FROM nutrition_foods WHERE id = $1 RETURNING {FOOD_COLUMNS}"
    ))
    .bind(id)
    .fetch_optional(db)
    .await?;
    Ok(food)
}

/// A sample of the table, used as recommendation context.
pub async fn sample_names(db: &PgPool, limit: i64) -> anyhow::Result<Vec<String>> {
    let names = sqlx::query_scalar::<_, String>(
        "SELECT name FROM nutrition_foods ORDER BY protein_per_100g DESC, name LIMIT $1",
    )
    .bind(limit)
    .fetch_all(db)
    .await?;
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(like_escape("rice"), "rice");
        assert_eq!(like_escape("100%_juice\\"), "100\\%\\_juice\\\\");
    }

    fn lentils() -> NewFood {
        NewFood {
            name: "Red Lentils".into(),
            per_100g: Nutrients {
                calories: 116.0,
                protein: 9.0,
                fat: 0.4,
                carbs: 20.0,
                fiber: 7.9,
            },
        }
    }

    #[sqlx::test]
    async fn names_clash_ignoring_case(pool: PgPool) {
        let food = insert(&pool, &lentils()).await.unwrap();
        assert_eq!(name_taken(&pool, "red lentils", None).await.unwrap(), Some(food.id));
        assert_eq!(name_taken(&pool, "RED LENTILS", Some(food.id)).await.unwrap(), None);

        let mut shouty = lentils();
        shouty.name = "RED LENTILS".into();
        let err = insert(&pool, &shouty).await.unwrap_err();
        assert!(err.as_database_error().is_some_and(|e| e.is_unique_violation()));
    }

    #[sqlx::test]
    async fn update_and_delete_by_id(pool: PgPool) {
        let food = insert(&pool, &lentils()).await.unwrap();
        let mut edited = lentils();
        edited.per_100g.protein = 9.5;
        let updated = update(&pool, food.id, &edited).await.unwrap().unwrap();
        assert_eq!(updated.protein_per_100g, 9.5);
        assert!(update(&pool, -1, &edited).await.unwrap().is_none());

        assert_eq!(delete(&pool, food.id).await.unwrap().map(|f| f.id), Some(food.id));
        assert!(delete(&pool, food.id).await.unwrap().is_none());
        assert!(list_all(&pool, 1000).await.unwrap().iter().all(|f| f.id != food.id));
    }
}
