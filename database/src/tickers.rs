use crate::Database;
use sqlx::Row;
use tickertalk_core::{CoreError, DatabaseError, TickerReference};

fn parse_terms(raw: &str) -> Result<Vec<String>, CoreError> {
    Ok(serde_json::from_str(raw)?)
}

impl Database {
    /// Load the full ticker reference set. Keyword lists are stored as
    /// JSON arrays in text columns. An empty set is a startup-fatal
    /// configuration problem for callers, not an error here.
    pub async fn load_tickers(&self) -> Result<Vec<TickerReference>, CoreError> {
        let rows = sqlx::query("SELECT * FROM tickers ORDER BY symbol")
            .fetch_all(&self.pool)
            .await
            .map_err(DatabaseError::Sql)?;

        rows.iter()
            .map(|row| {
                Ok(TickerReference {
                    symbol: row.try_get("symbol").map_err(DatabaseError::Sql)?,
                    name: row.try_get("name").map_err(DatabaseError::Sql)?,
                    aliases: parse_terms(row.try_get("aliases").map_err(DatabaseError::Sql)?)?,
                    positive_keywords: parse_terms(
                        row.try_get("positive_keywords").map_err(DatabaseError::Sql)?,
                    )?,
                    negative_keywords: parse_terms(
                        row.try_get("negative_keywords").map_err(DatabaseError::Sql)?,
                    )?,
                    industry_keywords: parse_terms(
                        row.try_get("industry_keywords").map_err(DatabaseError::Sql)?,
                    )?,
                })
            })
            .collect()
    }

    /// Write one reference row. Seeding is an external collaborator's
    /// job; this is the entry point it (and the tests) use.
    pub async fn insert_ticker(&self, ticker: &TickerReference) -> Result<(), CoreError> {
        sqlx::query(
            r#"
            INSERT INTO tickers
                (symbol, name, aliases, positive_keywords, negative_keywords, industry_keywords)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(symbol) DO UPDATE SET
                name = excluded.name,
                aliases = excluded.aliases,
                positive_keywords = excluded.positive_keywords,
                negative_keywords = excluded.negative_keywords,
                industry_keywords = excluded.industry_keywords
            "#,
        )
        .bind(&ticker.symbol)
        .bind(&ticker.name)
        .bind(serde_json::to_string(&ticker.aliases)?)
        .bind(serde_json::to_string(&ticker.positive_keywords)?)
        .bind(serde_json::to_string(&ticker.negative_keywords)?)
        .bind(serde_json::to_string(&ticker.industry_keywords)?)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::Sql)?;
        Ok(())
    }
}
