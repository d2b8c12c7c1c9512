use std::time::Instant;

use anyhow::{Context, Result};
use mysql::consts::ColumnType;
use mysql::prelude::Queryable;
use mysql::{Conn, OptsBuilder};

use plandiff_core::compare::{Column, DataType, Table, Value};
use plandiff_core::config::ConnectionConfig;
use plandiff_core::error::{SessionError, SessionResult};
use plandiff_core::session::{ExplainLevel, PlannerMode, PlannerSession};

use crate::profile::ProfileClient;

const LAST_QUERY_ID: &str = "select last_query_id() as query";

/// A single wire-protocol connection plus the HTTP client used for profiles.
pub struct MysqlSession {
    conn: Conn,
    profiles: ProfileClient,
}

impl MysqlSession {
    /// Connect and prepare the session: profile reporting on, and the
    /// configured fragment parallelism applied.
    pub fn connect(cfg: &ConnectionConfig) -> Result<Self> {
        let opts = OptsBuilder::new()
            .ip_or_hostname(Some(cfg.host.clone()))
            .tcp_port(cfg.query_port)
            .user(Some(cfg.user.clone()))
            .pass(Some(cfg.password.clone()))
            .db_name(cfg.database.clone());
        let conn = Conn::new(opts)
            .with_context(|| format!("connecting to {}:{}", cfg.host, cfg.query_port))?;
        let mut session = Self {
            conn,
            profiles: ProfileClient::new(&cfg.host, cfg.http_port, &cfg.user, &cfg.password),
        };

        session
            .execute("set is_report_success = true")
            .context("enabling query profiles")?;
        if let Some(n) = cfg.fragment_instances {
            session
                .execute(&format!("set parallel_fragment_exec_instance_num = {}", n))
                .context("setting fragment instances")?;
        }
        tracing::info!(host = %cfg.host, port = cfg.query_port, "session ready");
        Ok(session)
    }

    fn execute(&mut self, sql: &str) -> SessionResult<()> {
        tracing::trace!(sql, "execute");
        self.conn.query_drop(sql).map_err(map_driver_error)
    }

    fn first_column(&mut self, sql: &str) -> SessionResult<Vec<String>> {
        let (table, _) = self.query(sql)?;
        Ok(table
            .rows()
            .iter()
            .filter_map(|row| row.first())
            .map(Value::render)
            .collect())
    }
}

impl PlannerSession for MysqlSession {
    fn set_mode(&mut self, mode: PlannerMode) -> SessionResult<()> {
        let flag = match mode {
            PlannerMode::Old => "false",
            PlannerMode::New => "true",
        };
        self.execute(&format!("set enable_cbo = {}", flag))
    }

    fn use_database(&mut self, name: &str) -> SessionResult<()> {
        self.execute(&format!("use `{}`", name.replace('`', "``")))
    }

    fn query(&mut self, sql: &str) -> SessionResult<(Table, u64)> {
        let start = Instant::now();
        let mut result = self.conn.query_iter(sql).map_err(map_driver_error)?;
        let columns: Vec<Column> = result
            .columns()
            .as_ref()
            .iter()
            .map(|c| Column::new(c.name_str().into_owned(), column_data_type(c.column_type())))
            .collect();

        let mut rows = Vec::new();
        for row in result.by_ref() {
            let row = row.map_err(map_driver_error)?;
            let values = (0..row.len())
                .map(|i| row.as_ref(i).map(convert_value).unwrap_or(Value::Null))
                .collect();
            rows.push(values);
        }
        drop(result);

        let elapsed = start.elapsed().as_millis() as u64;
        Ok((Table::new(columns, rows), elapsed))
    }

    fn last_query_id(&mut self) -> SessionResult<String> {
        self.first_column(LAST_QUERY_ID)?
            .into_iter()
            .find(|id| id != "NULL")
            .ok_or_else(|| SessionError::Query("last_query_id() returned no id".to_string()))
    }

    fn explain(&mut self, sql: &str, level: ExplainLevel) -> SessionResult<String> {
        let lines = self.first_column(&format!("explain {} {}", level.as_str(), sql))?;
        let mut out = lines.join("\n");
        out.push('\n');
        Ok(out)
    }

    fn profile(&mut self, query_id: &str) -> SessionResult<String> {
        self.profiles.fetch(query_id)
    }
}

/// SQLSTATE class 42 covers syntax errors and access rule violations.
pub fn is_syntax_state(state: &str) -> bool {
    state.starts_with("42")
}

pub fn map_driver_error(err: mysql::Error) -> SessionError {
    match err {
        mysql::Error::MySqlError(server) if is_syntax_state(&server.state) => {
            SessionError::Syntax(server.to_string())
        }
        mysql::Error::MySqlError(server) => SessionError::Query(server.to_string()),
        mysql::Error::IoError(e) => SessionError::Io(e),
        mysql::Error::DriverError(e) => SessionError::Transport(e.to_string()),
        other => SessionError::Query(other.to_string()),
    }
}

pub fn column_data_type(ty: ColumnType) -> DataType {
    match ty {
        ColumnType::MYSQL_TYPE_TINY
        | ColumnType::MYSQL_TYPE_SHORT
        | ColumnType::MYSQL_TYPE_LONG
        | ColumnType::MYSQL_TYPE_INT24
        | ColumnType::MYSQL_TYPE_LONGLONG
        | ColumnType::MYSQL_TYPE_YEAR => DataType::Integer,
        ColumnType::MYSQL_TYPE_DECIMAL | ColumnType::MYSQL_TYPE_NEWDECIMAL => DataType::Decimal,
        ColumnType::MYSQL_TYPE_FLOAT => DataType::Float,
        ColumnType::MYSQL_TYPE_DOUBLE => DataType::Double,
        ColumnType::MYSQL_TYPE_DATE
        | ColumnType::MYSQL_TYPE_NEWDATE
        | ColumnType::MYSQL_TYPE_DATETIME
        | ColumnType::MYSQL_TYPE_TIMESTAMP
        | ColumnType::MYSQL_TYPE_TIME => DataType::Temporal,
        _ => DataType::Text,
    }
}

fn convert_value(v: &mysql::Value) -> Value {
    match v {
        mysql::Value::NULL => Value::Null,
        mysql::Value::Bytes(b) => Value::Text(String::from_utf8_lossy(b).into_owned()),
        mysql::Value::Int(i) => Value::Int(*i),
        mysql::Value::UInt(u) => i64::try_from(*u)
            .map(Value::Int)
            .unwrap_or_else(|_| Value::Text(u.to_string())),
        mysql::Value::Float(f) => Value::Real(f64::from(*f)),
        mysql::Value::Double(d) => Value::Real(*d),
        mysql::Value::Date(y, mo, d, h, mi, s, us) => {
            let mut text = format!("{:04}-{:02}-{:02} {:02}:{:02}:{:02}", y, mo, d, h, mi, s);
            if *us > 0 {
                text.push_str(&format!(".{:06}", us));
            }
            Value::Text(text)
        }
        mysql::Value::Time(neg, days, h, mi, s, us) => {
            let hours = u64::from(*days) * 24 + u64::from(*h);
            let sign = if *neg { "-" } else { "" };
            let mut text = format!("{}{:02}:{:02}:{:02}", sign, hours, mi, s);
            if *us > 0 {
                text.push_str(&format!(".{:06}", us));
            }
            Value::Text(text)
        }
    }
}
