//! STMT_PREPARE response state machine.

use crate::error::{Error, Result};
use crate::protocol::column::FieldDescription;
use crate::protocol::command::StmtPrepareOk;
use crate::protocol::response::is_eof;
use crate::registry::PreparedStatementInfo;

use super::action::Action;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    WaitingPrepareOk,
    ReadingParams { remaining: u16 },
    WaitingParamsEof,
    ReadingColumns { remaining: u16 },
    WaitingColumnsEof,
    Finished,
}

/// Reads the prepare OK packet, the parameter definitions and the result
/// column definitions, each block followed by an EOF marker.
pub struct PrepareStateMachine {
    state: State,
    prepare_ok: Option<StmtPrepareOk>,
    params: Vec<FieldDescription>,
    columns: Vec<FieldDescription>,
}

impl PrepareStateMachine {
    pub fn new() -> Self {
        Self {
            state: State::WaitingPrepareOk,
            prepare_ok: None,
            params: Vec::new(),
            columns: Vec::new(),
        }
    }

    /// Process a response packet payload.
    pub fn step(&mut self, payload: &[u8]) -> Result<Action> {
        self.state = match self.state {
            State::WaitingPrepareOk => {
                let ok = StmtPrepareOk::parse(payload)?;
                self.params.reserve(ok.num_params as usize);
                self.columns.reserve(ok.num_columns as usize);
                self.prepare_ok = Some(ok);
                params_state(ok.num_params, ok.num_columns)
            }
            State::ReadingParams { remaining } => {
                self.params.push(FieldDescription::parse(payload)?);
                if remaining > 1 {
                    State::ReadingParams {
                        remaining: remaining - 1,
                    }
                } else {
                    State::WaitingParamsEof
                }
            }
            State::WaitingParamsEof => {
                expect_eof(payload, "parameter definitions")?;
                let num_columns = self.prepare_ok.map_or(0, |ok| ok.num_columns);
                columns_state(num_columns)
            }
            State::ReadingColumns { remaining } => {
                self.columns.push(FieldDescription::parse(payload)?);
                if remaining > 1 {
                    State::ReadingColumns {
                        remaining: remaining - 1,
                    }
                } else {
                    State::WaitingColumnsEof
                }
            }
            State::WaitingColumnsEof => {
                expect_eof(payload, "column definitions")?;
                State::Finished
            }
            State::Finished => {
                return Err(Error::Protocol(
                    "Unexpected packet after STMT_PREPARE response".into(),
                ));
            }
        };

        if self.state == State::Finished {
            Ok(Action::Finished)
        } else {
            Ok(Action::ReadPacket)
        }
    }

    /// The registered statement, once `step` has returned `Finished`.
    pub fn take_statement(&mut self) -> Option<PreparedStatementInfo> {
        if self.state != State::Finished {
            return None;
        }
        let ok = self.prepare_ok.take()?;
        Some(PreparedStatementInfo {
            statement_id: ok.statement_id,
            param_count: ok.num_params,
            params: std::mem::take(&mut self.params),
            columns: std::mem::take(&mut self.columns),
            queued_for_release: false,
        })
    }
}

impl Default for PrepareStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

fn params_state(num_params: u16, num_columns: u16) -> State {
    if num_params > 0 {
        State::ReadingParams {
            remaining: num_params,
        }
    } else {
        columns_state(num_columns)
    }
}

fn columns_state(num_columns: u16) -> State {
    if num_columns > 0 {
        State::ReadingColumns {
            remaining: num_columns,
        }
    } else {
        State::Finished
    }
}

fn expect_eof(payload: &[u8], after: &str) -> Result<()> {
    if is_eof(payload) {
        Ok(())
    } else {
        Err(Error::Protocol(format!("Expected EOF after {after}")))
    }
}
