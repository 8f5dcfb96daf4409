// Constructeur générique de requêtes de liste à partir de la query string
//
//   GET /tours?difficulty=easy&price[lt]=1500&sort=-price,name&fields=name,price&page=2&limit=10
//
// Quatre étapes indépendantes, appliquées dans l'ordre :
//   1. filter      : égalité / IN / gte, gt, lte, lt
//   2. sort        : liste de clés, "-" = descendant, id en dernier départage
//   3. limit_fields: projection sur le JSON sérialisé (id toujours gardé)
//   4. paginate    : page (1) / limit (100)

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::sea_query::SimpleExpr;
use sea_orm::{
    ColumnTrait, EntityTrait, Order, QueryFilter, QueryOrder, QuerySelect, Select, Value,
};
use serde_json::{Map, Value as Json};
use std::collections::BTreeMap;
use std::str::FromStr;

use crate::error::AppError;

const DEFAULT_PAGE: u64 = 1;
const DEFAULT_LIMIT: u64 = 100;
const MAX_LIMIT: u64 = 1000;

/// Type de valeur attendu pour un champ filtrable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Integer,
    Float,
    Decimal,
    Text,
    Boolean,
    DateTime,
}

/// Mapping nom de champ API (camelCase) -> colonne, implémenté par chaque entité listable
pub trait Queryable: EntityTrait {
    fn field(name: &str) -> Option<(Self::Column, FieldKind)>;

    fn id_column() -> Self::Column;

    fn default_sort() -> &'static str {
        "-createdAt"
    }

    /// Champs acceptant plusieurs valeurs (`?duration=5&duration=9` -> IN) ;
    /// pour les autres, la dernière valeur gagne
    fn multi_valued(_name: &str) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    Eq,
    Gte,
    Gt,
    Lte,
    Lt,
}

impl Operator {
    fn parse(raw: Option<&str>) -> Option<Self> {
        match raw {
            None => Some(Operator::Eq),
            Some("gte") => Some(Operator::Gte),
            Some("gt") => Some(Operator::Gt),
            Some("lte") => Some(Operator::Lte),
            Some("lt") => Some(Operator::Lt),
            Some(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Condition {
    field: String,
    operator: Operator,
    raw: String,
}

/// Query string découpée : conditions de filtre + clés réservées
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryParams {
    conditions: Vec<Condition>,
    sort: Option<String>,
    fields: Option<String>,
    page: Option<String>,
    limit: Option<String>,
}

impl QueryParams {
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut params = QueryParams::default();

        for (key, value) in pairs {
            let key = key.as_ref();
            let value = value.into();

            // Clés réservées : la dernière occurrence gagne
            match key {
                "sort" => params.sort = Some(value),
                "fields" => params.fields = Some(value),
                "page" => params.page = Some(value),
                "limit" => params.limit = Some(value),
                _ => {
                    let (field, operator) = split_key(key);
                    if let Some(operator) = Operator::parse(operator) {
                        params.conditions.push(Condition {
                            field: field.to_string(),
                            operator,
                            raw: value,
                        });
                    }
                }
            }
        }

        params
    }

    /// Force les clés réservées (alias du type "top-5-cheap")
    pub fn with_overrides(mut self, sort: &str, limit: u64, fields: &str) -> Self {
        self.sort = Some(sort.to_string());
        self.limit = Some(limit.to_string());
        self.fields = Some(fields.to_string());
        self
    }
}

/// "price[gte]" -> ("price", Some("gte"))
fn split_key(key: &str) -> (&str, Option<&str>) {
    match key.find('[') {
        Some(open) if key.ends_with(']') => (&key[..open], Some(&key[open + 1..key.len() - 1])),
        _ => (key, None),
    }
}

/// Projection des champs demandés (`fields=name,price` ou `fields=-summary`)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Projection {
    include: Vec<String>,
    exclude: Vec<String>,
}

impl Projection {
    pub fn parse(raw: &str) -> Self {
        let mut projection = Projection::default();
        for field in raw.split(',').map(str::trim).filter(|f| !f.is_empty()) {
            match field.strip_prefix('-') {
                Some(excluded) => projection.exclude.push(excluded.to_string()),
                None => projection.include.push(field.to_string()),
            }
        }
        projection
    }

    pub fn is_empty(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }

    /// Applique la projection à un document sérialisé ; `id` est toujours conservé
    pub fn apply(&self, document: Json) -> Json {
        let Json::Object(map) = document else {
            return document;
        };
        if self.is_empty() {
            return Json::Object(map);
        }

        let kept: Map<String, Json> = map
            .into_iter()
            .filter(|(key, _)| {
                if key == "id" {
                    return true;
                }
                if !self.include.is_empty() {
                    self.include.iter().any(|f| f == key)
                } else {
                    !self.exclude.iter().any(|f| f == key)
                }
            })
            .collect();
        Json::Object(kept)
    }
}

pub struct ApiFeatures<E: Queryable> {
    select: Select<E>,
    params: QueryParams,
    projection: Projection,
}

impl<E: Queryable> ApiFeatures<E> {
    pub fn new(select: Select<E>, params: QueryParams) -> Self {
        Self {
            select,
            params,
            projection: Projection::default(),
        }
    }

    pub fn filter(mut self) -> Result<Self, AppError> {
        // Regroupe les égalités par champ : plusieurs valeurs -> IN (liste blanche)
        let mut equalities: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        let mut expressions: Vec<SimpleExpr> = Vec::new();

        for condition in &self.params.conditions {
            let Some((column, kind)) = E::field(&condition.field) else {
                continue;
            };

            match condition.operator {
                Operator::Eq => {
                    let values = equalities.entry(condition.field.as_str()).or_default();
                    if !E::multi_valued(&condition.field) {
                        values.clear();
                    }
                    values.push(condition.raw.as_str());
                }
                operator => {
                    let value = parse_value(kind, &condition.field, &condition.raw)?;
                    expressions.push(match operator {
                        Operator::Gte => column.gte(value),
                        Operator::Gt => column.gt(value),
                        Operator::Lte => column.lte(value),
                        _ => column.lt(value),
                    });
                }
            }
        }

        for (field, raws) in equalities {
            let Some((column, kind)) = E::field(field) else {
                continue;
            };
            let mut values = raws
                .into_iter()
                .map(|raw| parse_value(kind, field, raw))
                .collect::<Result<Vec<Value>, AppError>>()?;

            let expression = if values.len() == 1 {
                match values.pop() {
                    Some(value) => column.eq(value),
                    None => continue,
                }
            } else {
                column.is_in(values)
            };
            expressions.push(expression);
        }

        for expression in expressions {
            self.select = self.select.filter(expression);
        }
        Ok(self)
    }

    pub fn sort(mut self) -> Self {
        let raw = self
            .params
            .sort
            .clone()
            .unwrap_or_else(|| E::default_sort().to_string());

        for key in raw.split(',').map(str::trim).filter(|k| !k.is_empty()) {
            let (name, order) = match key.strip_prefix('-') {
                Some(name) => (name, Order::Desc),
                None => (key, Order::Asc),
            };
            if let Some((column, _)) = E::field(name) {
                self.select = self.select.order_by(column, order);
            }
        }

        // Départage stable pour une pagination déterministe
        self.select = self.select.order_by(E::id_column(), Order::Asc);
        self
    }

    pub fn limit_fields(mut self) -> Self {
        if let Some(raw) = &self.params.fields {
            self.projection = Projection::parse(raw);
        }
        self
    }

    pub fn paginate(mut self) -> Self {
        let page = positive_or(self.params.page.as_deref(), DEFAULT_PAGE);
        let limit = positive_or(self.params.limit.as_deref(), DEFAULT_LIMIT).min(MAX_LIMIT);
        // Page hors bornes : retour à la première page
        let skip = page
            .saturating_sub(1)
            .checked_mul(limit)
            .filter(|skip| i64::try_from(*skip).is_ok())
            .unwrap_or(0);

        self.select = self.select.offset(skip).limit(limit);
        self
    }

    pub fn into_parts(self) -> (Select<E>, Projection) {
        (self.select, self.projection)
    }
}

fn positive_or(raw: Option<&str>, default: u64) -> u64 {
    raw.and_then(|r| r.trim().parse::<u64>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(default)
}

fn parse_value(kind: FieldKind, field: &str, raw: &str) -> Result<Value, AppError> {
    let cast = || AppError::cast(field, raw);
    let trimmed = raw.trim();

    let value = match kind {
        FieldKind::Integer => trimmed.parse::<i64>().map_err(|_| cast())?.into(),
        FieldKind::Float => trimmed.parse::<f64>().map_err(|_| cast())?.into(),
        FieldKind::Decimal => Decimal::from_str(trimmed).map_err(|_| cast())?.into(),
        FieldKind::Text => raw.to_string().into(),
        FieldKind::Boolean => match trimmed {
            "true" => true.into(),
            "false" => false.into(),
            _ => return Err(cast()),
        },
        FieldKind::DateTime => parse_datetime(trimmed).ok_or_else(cast)?.into(),
    };
    Ok(value)
}

/// RFC 3339 ou date seule (minuit UTC)
fn parse_datetime(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}
