use std::collections::HashMap;

use crate::{
    error::{invalid_request, QueryError},
    schema::{Id, RecipeTagRow, Tag, TagChanges},
};

use sqlx::{Pool, Postgres};

pub async fn list_tags(pool: &Pool<Postgres>) -> Result<Vec<Tag>, potion::Error> {
    let list: Vec<Tag> = sqlx::query_as("SELECT id, name, color, slug FROM tags ORDER BY name, id")
        .fetch_all(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(list)
}

pub async fn get_tag(id: Id, pool: &Pool<Postgres>) -> Result<Option<Tag>, potion::Error> {
    let tag: Option<Tag> = sqlx::query_as("SELECT id, name, color, slug FROM tags WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(tag)
}

pub async fn create_tag(
    name: &str,
    color: Option<&str>,
    slug: &str,
    pool: &Pool<Postgres>,
) -> Result<Tag, potion::Error> {
    let tag: Option<Tag> = sqlx::query_as(
        "
        INSERT INTO tags (name, color, slug) VALUES ($1, $2, $3)
        ON CONFLICT DO NOTHING RETURNING id, name, color, slug
    ",
    )
    .bind(name)
    .bind(color)
    .bind(slug)
    .fetch_optional(pool)
    .await
    .map_err(QueryError::from)?;

    tag.ok_or_else(|| invalid_request("A tag with this name or slug already exists."))
}

pub async fn update_tag(
    id: Id,
    changes: &TagChanges,
    pool: &Pool<Postgres>,
) -> Result<Option<Tag>, potion::Error> {
    let tag: Option<Tag> = sqlx::query_as(
        "
        UPDATE tags SET
            name = COALESCE($2, name),
            color = COALESCE($3, color),
            slug = COALESCE($4, slug)
        WHERE id = $1
        RETURNING id, name, color, slug
    ",
    )
    .bind(id)
    .bind(&changes.name)
    .bind(&changes.color)
    .bind(&changes.slug)
    .fetch_optional(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(tag)
}

/// Returns whether the tag existed.
pub async fn delete_tag(id: Id, pool: &Pool<Postgres>) -> Result<bool, potion::Error> {
    let result = sqlx::query("DELETE FROM tags WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(result.rows_affected() > 0)
}

/// Returns the ids in `ids` that match no tag.
pub async fn missing_tags(ids: &[Id], pool: &Pool<Postgres>) -> Result<Vec<Id>, potion::Error> {
    let found: Vec<(Id,)> = sqlx::query_as("SELECT id FROM tags WHERE id = ANY($1)")
        .bind(ids)
        .fetch_all(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(ids
        .iter()
        .filter(|id| !found.iter().any(|(found,)| found == *id))
        .copied()
        .collect())
}

/// Tags of every recipe in `recipe_ids`, keyed by recipe.
pub async fn tags_for_recipes(
    recipe_ids: &[Id],
    pool: &Pool<Postgres>,
) -> Result<HashMap<Id, Vec<Tag>>, potion::Error> {
    let rows: Vec<RecipeTagRow> = sqlx::query_as(
        "
        SELECT rt.recipe_id, t.id, t.name, t.color, t.slug
        FROM recipe_tags rt
        INNER JOIN tags t ON t.id = rt.tag_id
        WHERE rt.recipe_id = ANY($1)
        ORDER BY t.id
    ",
    )
    .bind(recipe_ids)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    let mut hashmap: HashMap<Id, Vec<Tag>> = HashMap::new();
    rows.into_iter().for_each(|row| {
        hashmap.entry(row.recipe_id).or_default().push(row.into());
    });

    Ok(hashmap)
}
