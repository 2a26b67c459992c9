/// The row (and optionally the field within it) under the user's cursor.
#[derive(Debug, Clone, PartialEq)]
pub struct FocusData {
    pub datapoint_id: String,
    pub sub_field: Option<String>,
}

#[derive(Debug, Default)]
pub struct FocusService {
    focus_data: Option<FocusData>,
    revision: u64,
}

impl FocusService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn focus_data(&self) -> Option<&FocusData> {
        self.focus_data.as_ref()
    }

    pub fn focused_id(&self) -> Option<&str> {
        self.focus_data.as_ref().map(|f| f.datapoint_id.as_str())
    }

    pub fn set_focus(&mut self, datapoint_id: impl Into<String>, sub_field: Option<String>) {
        let focus = Some(FocusData {
            datapoint_id: datapoint_id.into(),
            sub_field,
        });
        if focus != self.focus_data {
            self.focus_data = focus;
            self.revision += 1;
        }
    }

    pub fn clear_focus(&mut self) {
        if self.focus_data.take().is_some() {
            self.revision += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn focus_and_clear() {
        let mut focus = FocusService::new();
        focus.set_focus("r1", Some("sentence".to_string()));
        assert_eq!(focus.focused_id(), Some("r1"));
        assert_eq!(
            focus.focus_data().and_then(|f| f.sub_field.as_deref()),
            Some("sentence")
        );
        let rev = focus.revision();
        focus.set_focus("r1", Some("sentence".to_string()));
        assert_eq!(focus.revision(), rev);
        focus.clear_focus();
        assert_eq!(focus.focused_id(), None);
        assert!(focus.revision() > rev);
    }
}
