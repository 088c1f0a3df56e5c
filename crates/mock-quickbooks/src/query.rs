//! 查询语言解析
//!
//! 只支持本服务用到的子集：
//! `select * from <Entity> [where <Field> <op> '<value>' [and ...]]`，
//! 字段可用点号访问嵌套对象（如 `MetaData.LastUpdatedTime`），字符串中的单引号以 `\'` 转义。

use chrono::{DateTime, FixedOffset};
use regex::Regex;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("无法解析查询语句: {0}")]
    Syntax(String),

    #[error("无法解析查询条件: {0}")]
    Condition(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Gt,
    Ge,
    Lt,
    Le,
}

impl Operator {
    fn parse(op: &str) -> Option<Self> {
        match op {
            "=" => Some(Self::Eq),
            ">" => Some(Self::Gt),
            ">=" => Some(Self::Ge),
            "<" => Some(Self::Lt),
            "<=" => Some(Self::Le),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    pub field: String,
    pub op: Operator,
    pub value: String,
}

impl Condition {
    fn lookup<'a>(&self, record: &'a Value) -> Option<&'a Value> {
        self.field
            .split('.')
            .try_fold(record, |node, segment| node.get(segment))
    }

    /// 等值比较大小写不敏感；大小比较优先按时间戳，其次按数字，最后按字符串
    pub fn matches(&self, record: &Value) -> bool {
        let actual = match self.lookup(record) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            Some(Value::Bool(b)) => b.to_string(),
            _ => return false,
        };

        if self.op == Operator::Eq {
            return actual.eq_ignore_ascii_case(&self.value);
        }

        let ordering = match (parse_time(&actual), parse_time(&self.value)) {
            (Some(a), Some(b)) => a.partial_cmp(&b),
            _ => match (actual.parse::<f64>(), self.value.parse::<f64>()) {
                (Ok(a), Ok(b)) => a.partial_cmp(&b),
                _ => Some(actual.as_str().cmp(self.value.as_str())),
            },
        };

        match ordering {
            Some(std::cmp::Ordering::Greater) => matches!(self.op, Operator::Gt | Operator::Ge),
            Some(std::cmp::Ordering::Less) => matches!(self.op, Operator::Lt | Operator::Le),
            Some(std::cmp::Ordering::Equal) => matches!(self.op, Operator::Ge | Operator::Le),
            None => false,
        }
    }
}

fn parse_time(value: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(value).ok()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub entity: String,
    pub conditions: Vec<Condition>,
}

impl Query {
    pub fn matches(&self, record: &Value) -> bool {
        self.conditions.iter().all(|c| c.matches(record))
    }
}

/// 查询解析器
pub struct QueryParser {
    statement: Regex,
    condition: Regex,
    and: Regex,
}

impl QueryParser {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            statement: Regex::new(r"(?is)^\s*select\s+\*\s+from\s+(\w+)(?:\s+where\s+(.+?))?\s*$")?,
            condition: Regex::new(r"(?s)^\s*([\w.]+)\s*(>=|<=|=|>|<)\s*'((?:[^'\\]|\\.)*)'\s*$")?,
            and: Regex::new(r"(?i)'\s+and\s+")?,
        })
    }

    pub fn parse(&self, statement: &str) -> Result<Query, QueryError> {
        let caps = self
            .statement
            .captures(statement)
            .ok_or_else(|| QueryError::Syntax(statement.to_string()))?;

        let entity = caps[1].to_string();
        let conditions = match caps.get(2) {
            Some(clause) => self.split_and(clause.as_str())
                .into_iter()
                .map(|part| self.parse_condition(&part))
                .collect::<Result<Vec<_>, _>>()?,
            None => Vec::new(),
        };

        Ok(Query { entity, conditions })
    }

    /// 按 `' and ` 切分，保留每段末尾的引号
    fn split_and(&self, clause: &str) -> Vec<String> {
        let mut parts = Vec::new();
        let mut rest = clause;
        while let Some(m) = self.and.find(rest) {
            parts.push(rest[..m.start() + 1].to_string());
            rest = &rest[m.end()..];
        }
        parts.push(rest.to_string());
        parts
    }

    fn parse_condition(&self, text: &str) -> Result<Condition, QueryError> {
        let caps = self
            .condition
            .captures(text)
            .ok_or_else(|| QueryError::Condition(text.trim().to_string()))?;
        let op = Operator::parse(&caps[2])
            .ok_or_else(|| QueryError::Condition(text.trim().to_string()))?;

        Ok(Condition {
            field: caps[1].to_string(),
            op,
            value: unescape(&caps[3]),
        })
    }
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parser() -> QueryParser {
        QueryParser::new().unwrap()
    }

    #[test]
    fn test_parse_select_all() {
        let query = parser().parse("select * from Item").unwrap();
        assert_eq!(query.entity, "Item");
        assert!(query.conditions.is_empty());
    }

    #[test]
    fn test_parse_escaped_quote() {
        let query = parser()
            .parse("select * from Customer where DisplayName = 'O\\'Reilly'")
            .unwrap();
        assert_eq!(query.conditions[0].value, "O'Reilly");
        assert!(query.matches(&json!({ "DisplayName": "o'reilly" })));
    }

    #[test]
    fn test_parse_conjunction() {
        let query = parser()
            .parse("SELECT * FROM SalesReceipt WHERE DocNumber = 'R1' and TotalAmt > '10'")
            .unwrap();
        assert_eq!(query.conditions.len(), 2);
        assert!(query.matches(&json!({ "DocNumber": "R1", "TotalAmt": 12.5 })));
        assert!(!query.matches(&json!({ "DocNumber": "R1", "TotalAmt": 9 })));
    }

    #[test]
    fn test_nested_timestamp_comparison() {
        let query = parser()
            .parse("select * from Item where MetaData.LastUpdatedTime > '2024-01-01T00:00:00Z'")
            .unwrap();
        assert!(query.matches(&json!({
            "MetaData": { "LastUpdatedTime": "2024-01-02T00:00:00-08:00" }
        })));
        assert!(!query.matches(&json!({
            "MetaData": { "LastUpdatedTime": "2023-12-31T00:00:00Z" }
        })));
        assert!(!query.matches(&json!({ "Name": "no metadata" })));
    }

    #[test]
    fn test_rejects_unsupported_syntax() {
        assert!(matches!(
            parser().parse("delete from Item"),
            Err(QueryError::Syntax(_))
        ));
        assert!(matches!(
            parser().parse("select * from Item where Name like 'A%'"),
            Err(QueryError::Condition(_))
        ));
    }
}
