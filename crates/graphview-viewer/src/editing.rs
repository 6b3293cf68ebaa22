use graphview_core::{EntityRef, Point, ViewerError};

/// The editing gesture in progress. Only one at a time.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum EditingState {
    #[default]
    Idle,
    DrawingRubberLine {
        start: Point,
        current: Point,
    },
    /// Ports are in graph coordinates.
    InsertingEdge {
        source_port: Option<Point>,
        target_port: Option<Point>,
        rubber_edge_visible: bool,
    },
    Dragging {
        entities: Vec<EntityRef>,
    },
}

impl EditingState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::DrawingRubberLine { .. } => "DrawingRubberLine",
            Self::InsertingEdge { .. } => "InsertingEdge",
            Self::Dragging { .. } => "Dragging",
        }
    }
}

/// Result of a stop or cancel request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Stopped,
    /// Nothing was running; overlapping input can cancel a gesture twice.
    AlreadyIdle,
}

/// Gesture state machine: `Idle -> X -> Idle` for each gesture X.
/// Starting a gesture while another one runs is an error.
#[derive(Debug, Clone, Default)]
pub struct LayoutEditor {
    state: EditingState,
}

impl LayoutEditor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &EditingState {
        &self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == EditingState::Idle
    }

    pub fn inserting_edge(&self) -> bool {
        matches!(self.state, EditingState::InsertingEdge { .. })
    }

    /// Drops whatever gesture was running, e.g. when a new graph is bound.
    pub fn reset(&mut self) {
        if !self.is_idle() {
            tracing::debug!("Abandoning {} gesture", self.state.name());
        }
        self.state = EditingState::Idle;
    }

    fn enter(&mut self, operation: &'static str, next: EditingState) -> Result<(), ViewerError> {
        if !self.is_idle() {
            return Err(ViewerError::invalid_state(
                operation,
                format!("{} gesture already in progress", self.state.name()),
            ));
        }
        tracing::debug!("Editing state Idle -> {}", next.name());
        self.state = next;
        Ok(())
    }

    /// Common shape of every stop: benign when idle, an error when a
    /// different gesture is running.
    fn leave(
        &mut self,
        operation: &'static str,
        expected: &'static str,
    ) -> Result<(StopOutcome, EditingState), ViewerError> {
        if self.is_idle() {
            return Ok((StopOutcome::AlreadyIdle, EditingState::Idle));
        }
        if self.state.name() != expected {
            return Err(self.wrong_state(operation, expected));
        }
        tracing::debug!("Editing state {} -> Idle", expected);
        let previous = std::mem::take(&mut self.state);
        Ok((StopOutcome::Stopped, previous))
    }

    fn wrong_state(&self, operation: &'static str, expected: &'static str) -> ViewerError {
        ViewerError::invalid_state(
            operation,
            format!("expected {expected}, editor is {}", self.state.name()),
        )
    }

    pub fn start_rubber_line(&mut self, start: Point) -> Result<(), ViewerError> {
        self.enter(
            "start_drawing_rubber_line",
            EditingState::DrawingRubberLine {
                start,
                current: start,
            },
        )
    }

    /// Moves the loose end; returns the fixed start point.
    pub fn update_rubber_line(&mut self, to: Point) -> Result<Point, ViewerError> {
        match &mut self.state {
            EditingState::DrawingRubberLine { start, current } => {
                *current = to;
                Ok(*start)
            }
            _ => Err(self.wrong_state("draw_rubber_line", "DrawingRubberLine")),
        }
    }

    pub fn stop_rubber_line(&mut self) -> Result<StopOutcome, ViewerError> {
        self.leave("stop_drawing_rubber_line", "DrawingRubberLine")
            .map(|(outcome, _)| outcome)
    }

    pub fn begin_edge_insertion(&mut self) -> Result<(), ViewerError> {
        self.enter(
            "begin_edge_insertion",
            EditingState::InsertingEdge {
                source_port: None,
                target_port: None,
                rubber_edge_visible: false,
            },
        )
    }

    fn ports_mut(
        &mut self,
        operation: &'static str,
    ) -> Result<(&mut Option<Point>, &mut Option<Point>), ViewerError> {
        match &mut self.state {
            EditingState::InsertingEdge {
                source_port,
                target_port,
                ..
            } => Ok((source_port, target_port)),
            other => Err(ViewerError::invalid_state(
                operation,
                format!("expected InsertingEdge, editor is {}", other.name()),
            )),
        }
    }

    pub fn set_source_port(&mut self, port: Point) -> Result<(), ViewerError> {
        *self.ports_mut("set_source_port_for_edge_routing")?.0 = Some(port);
        Ok(())
    }

    pub fn set_target_port(&mut self, port: Point) -> Result<(), ViewerError> {
        *self.ports_mut("set_target_port_for_edge_routing")?.1 = Some(port);
        Ok(())
    }

    pub fn remove_source_port(&mut self) -> Result<(), ViewerError> {
        *self.ports_mut("remove_source_port_edge_routing")?.0 = None;
        Ok(())
    }

    pub fn remove_target_port(&mut self) -> Result<(), ViewerError> {
        *self.ports_mut("remove_target_port_edge_routing")?.1 = None;
        Ok(())
    }

    /// Current `(source, target)` ports without leaving the state.
    pub fn ports(&self) -> Option<(Option<Point>, Option<Point>)> {
        match &self.state {
            EditingState::InsertingEdge {
                source_port,
                target_port,
                ..
            } => Some((*source_port, *target_port)),
            _ => None,
        }
    }

    pub fn show_rubber_edge(&mut self) -> Result<(), ViewerError> {
        match &mut self.state {
            EditingState::InsertingEdge {
                rubber_edge_visible,
                ..
            } => {
                *rubber_edge_visible = true;
                Ok(())
            }
            _ => Err(self.wrong_state("draw_rubber_edge", "InsertingEdge")),
        }
    }

    /// Returns `AlreadyIdle` when no rubber edge is on screen.
    pub fn hide_rubber_edge(&mut self) -> StopOutcome {
        match &mut self.state {
            EditingState::InsertingEdge {
                rubber_edge_visible,
                ..
            } if *rubber_edge_visible => {
                *rubber_edge_visible = false;
                StopOutcome::Stopped
            }
            _ => StopOutcome::AlreadyIdle,
        }
    }

    /// Leaves `InsertingEdge`, handing back the recorded ports.
    pub fn finish_edge_insertion(
        &mut self,
    ) -> Result<(Option<Point>, Option<Point>), ViewerError> {
        let ports = self
            .ports()
            .ok_or_else(|| self.wrong_state("finish_edge_insertion", "InsertingEdge"))?;
        self.state = EditingState::Idle;
        tracing::debug!("Editing state InsertingEdge -> Idle");
        Ok(ports)
    }

    pub fn cancel_edge_insertion(&mut self) -> Result<StopOutcome, ViewerError> {
        self.leave("cancel_edge_insertion", "InsertingEdge")
            .map(|(outcome, _)| outcome)
    }

    pub fn start_drag(&mut self, entities: Vec<EntityRef>) -> Result<(), ViewerError> {
        self.enter("start_drag", EditingState::Dragging { entities })
    }

    /// Leaves `Dragging`; yields the entities the drag started with.
    pub fn end_drag(&mut self) -> Result<(StopOutcome, Vec<EntityRef>), ViewerError> {
        let (outcome, previous) = self.leave("on_drag_end", "Dragging")?;
        let entities = match previous {
            EditingState::Dragging { entities } => entities,
            _ => Vec::new(),
        };
        Ok((outcome, entities))
    }
}
