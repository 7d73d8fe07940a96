use crate::images::EncodedImage;
use crate::palette::ColorSuggestion;

/// The three independent asynchronous workflows a session runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Track {
    Analysis,
    Composition,
    Restyle,
}

/// Issued by `begin_*` and required by `finish_*`/`fail_*`. The generation is
/// sampled at begin time; any input change that supersedes the attempt bumps
/// the track generation, so a late resolution carrying a stale ticket is
/// discarded without touching state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackTicket {
    pub track: Track,
    pub generation: u64,
}

/// Why a `begin_*` call refused to start. Missing inputs are a guard refusal,
/// not an error: the caller disables (or reports) the action and no state
/// changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeginRefusal {
    MissingSubject,
    MissingGarment,
    MissingResult,
    TrackBusy,
}

impl BeginRefusal {
    pub fn describe(&self) -> &'static str {
        match self {
            Self::MissingSubject => "no subject photo loaded",
            Self::MissingGarment => "no garment photo loaded",
            Self::MissingResult => "no try-on result to restyle yet",
            Self::TrackBusy => "a request for this step is already in flight",
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct TrackState {
    busy: bool,
    generation: u64,
}

impl TrackState {
    /// Disowns any in-flight attempt: the next resolution will carry a stale
    /// ticket and be ignored.
    fn invalidate(&mut self) {
        self.generation += 1;
        self.busy = false;
    }

    fn settle(&mut self, ticket: TrackTicket) -> bool {
        if ticket.generation != self.generation {
            return false;
        }
        self.busy = false;
        true
    }
}

/// The orchestrator's entire working set. All state is session-scoped and
/// in-memory; it is only ever mutated through the transition methods below.
#[derive(Debug, Default)]
pub struct SessionState {
    subject: Option<EncodedImage>,
    garment: Option<EncodedImage>,
    palette: Option<Vec<ColorSuggestion>>,
    selected_color: Option<String>,
    result: Option<EncodedImage>,
    error: Option<String>,
    analysis: TrackState,
    composition: TrackState,
    restyle: TrackState,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subject(&self) -> Option<&EncodedImage> {
        self.subject.as_ref()
    }

    pub fn garment(&self) -> Option<&EncodedImage> {
        self.garment.as_ref()
    }

    pub fn palette(&self) -> Option<&[ColorSuggestion]> {
        self.palette.as_deref()
    }

    pub fn selected_color(&self) -> Option<&str> {
        self.selected_color.as_deref()
    }

    pub fn result(&self) -> Option<&EncodedImage> {
        self.result.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_busy(&self, track: Track) -> bool {
        self.track(track).busy
    }

    pub fn any_busy(&self) -> bool {
        self.analysis.busy || self.composition.busy || self.restyle.busy
    }

    /// What the result view shows: the latest composite if one exists, else
    /// the subject photo, else nothing (the empty-state placeholder).
    pub fn displayed_image(&self) -> Option<&EncodedImage> {
        self.result.as_ref().or(self.subject.as_ref())
    }

    fn track(&self, track: Track) -> &TrackState {
        match track {
            Track::Analysis => &self.analysis,
            Track::Composition => &self.composition,
            Track::Restyle => &self.restyle,
        }
    }

    fn track_mut(&mut self, track: Track) -> &mut TrackState {
        match track {
            Track::Analysis => &mut self.analysis,
            Track::Composition => &mut self.composition,
            Track::Restyle => &mut self.restyle,
        }
    }

    /// A new subject invalidates everything downstream of it: palette,
    /// selection, result, error, and every in-flight request.
    pub fn set_subject(&mut self, image: EncodedImage) {
        self.subject = Some(image);
        self.reset_downstream_of_subject();
    }

    pub fn clear_subject(&mut self) {
        self.subject = None;
        self.reset_downstream_of_subject();
    }

    fn reset_downstream_of_subject(&mut self) {
        self.palette = None;
        self.selected_color = None;
        self.result = None;
        self.error = None;
        self.analysis.invalidate();
        self.composition.invalidate();
        self.restyle.invalidate();
    }

    /// A new garment invalidates the selection and any composite built from
    /// the previous garment.
    pub fn set_garment(&mut self, image: EncodedImage) {
        self.garment = Some(image);
        self.reset_downstream_of_garment();
    }

    pub fn clear_garment(&mut self) {
        self.garment = None;
        self.reset_downstream_of_garment();
    }

    fn reset_downstream_of_garment(&mut self) {
        self.selected_color = None;
        self.result = None;
        self.composition.invalidate();
        self.restyle.invalidate();
    }

    /// Re-entering analysis clears palette, selection, and result before the
    /// call goes out.
    pub fn begin_analysis(&mut self) -> Result<TrackTicket, BeginRefusal> {
        if self.subject.is_none() {
            return Err(BeginRefusal::MissingSubject);
        }
        if self.analysis.busy {
            return Err(BeginRefusal::TrackBusy);
        }
        self.palette = None;
        self.selected_color = None;
        self.result = None;
        self.error = None;
        self.analysis.busy = true;
        Ok(TrackTicket {
            track: Track::Analysis,
            generation: self.analysis.generation,
        })
    }

    pub fn finish_analysis(&mut self, ticket: TrackTicket, palette: Vec<ColorSuggestion>) -> bool {
        if !self.analysis.settle(ticket) {
            return false;
        }
        self.palette = Some(palette);
        true
    }

    /// Selecting a palette entry starts a composition. The selection is
    /// recorded at begin time and survives a failure; at most one
    /// composition is in flight per session.
    pub fn begin_composition(&mut self, color_hex: String) -> Result<TrackTicket, BeginRefusal> {
        if self.subject.is_none() {
            return Err(BeginRefusal::MissingSubject);
        }
        if self.garment.is_none() {
            return Err(BeginRefusal::MissingGarment);
        }
        if self.composition.busy {
            return Err(BeginRefusal::TrackBusy);
        }
        self.selected_color = Some(color_hex);
        self.error = None;
        self.composition.busy = true;
        Ok(TrackTicket {
            track: Track::Composition,
            generation: self.composition.generation,
        })
    }

    /// The prior result is replaced only on success; a failed composition
    /// leaves it untouched.
    pub fn finish_composition(&mut self, ticket: TrackTicket, result: EncodedImage) -> bool {
        if !self.composition.settle(ticket) {
            return false;
        }
        self.result = Some(result);
        true
    }

    /// Restyle never clears the palette or the selection.
    pub fn begin_restyle(&mut self) -> Result<TrackTicket, BeginRefusal> {
        if self.result.is_none() {
            return Err(BeginRefusal::MissingResult);
        }
        if self.restyle.busy {
            return Err(BeginRefusal::TrackBusy);
        }
        self.error = None;
        self.restyle.busy = true;
        Ok(TrackTicket {
            track: Track::Restyle,
            generation: self.restyle.generation,
        })
    }

    pub fn finish_restyle(&mut self, ticket: TrackTicket, result: EncodedImage) -> bool {
        if !self.restyle.settle(ticket) {
            return false;
        }
        self.result = Some(result);
        true
    }

    /// A failure on any track surfaces one human-readable message, clears
    /// that track's busy flag in the same step, and leaves held palette and
    /// result state alone.
    pub fn fail(&mut self, ticket: TrackTicket, message: String) -> bool {
        if !self.track_mut(ticket.track).settle(ticket) {
            return false;
        }
        self.error = Some(message);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::palette::PALETTE_SIZE;

    fn image(name: &str) -> EncodedImage {
        EncodedImage::from_bytes(&[0xFF, 0xD8, 0xFF, 0xE0, 0x01], "image/jpeg", name)
    }

    fn palette() -> Vec<ColorSuggestion> {
        (0..PALETTE_SIZE)
            .map(|idx| ColorSuggestion {
                hex: format!("#11223{idx}"),
                name: None,
            })
            .collect()
    }

    fn state_with_result() -> SessionState {
        let mut state = SessionState::new();
        state.set_subject(image("subject.jpg"));
        state.set_garment(image("garment.jpg"));
        let ticket = state.begin_analysis().unwrap();
        assert!(state.finish_analysis(ticket, palette()));
        let ticket = state.begin_composition("#1A2B3C".to_string()).unwrap();
        assert!(state.finish_composition(ticket, image("composite.png")));
        state
    }

    #[test]
    fn analysis_happy_path_yields_six_unselected_entries() {
        let mut state = SessionState::new();
        state.set_subject(image("subject.jpg"));
        let ticket = state.begin_analysis().unwrap();
        assert!(state.is_busy(Track::Analysis));
        assert!(state.finish_analysis(ticket, palette()));
        assert!(!state.is_busy(Track::Analysis));
        assert_eq!(state.palette().unwrap().len(), PALETTE_SIZE);
        assert_eq!(state.selected_color(), None);
    }

    #[test]
    fn analysis_requires_subject() {
        let mut state = SessionState::new();
        assert_eq!(state.begin_analysis(), Err(BeginRefusal::MissingSubject));
    }

    #[test]
    fn new_subject_clears_palette_selection_and_result() {
        let mut state = state_with_result();
        assert!(state.result().is_some());
        state.set_subject(image("other.jpg"));
        assert!(state.palette().is_none());
        assert!(state.selected_color().is_none());
        assert!(state.result().is_none());
        assert!(!state.any_busy());
    }

    #[test]
    fn clearing_subject_resets_downstream_too() {
        let mut state = state_with_result();
        state.clear_subject();
        assert!(state.subject().is_none());
        assert!(state.palette().is_none());
        assert!(state.result().is_none());
        assert!(state.displayed_image().is_none());
    }

    #[test]
    fn new_garment_clears_selection_and_result_but_keeps_palette() {
        let mut state = state_with_result();
        state.set_garment(image("other-garment.jpg"));
        assert!(state.palette().is_some());
        assert!(state.selected_color().is_none());
        assert!(state.result().is_none());
    }

    #[test]
    fn composition_requires_garment_and_records_selection() {
        let mut state = SessionState::new();
        state.set_subject(image("subject.jpg"));
        assert_eq!(
            state.begin_composition("#1A2B3C".to_string()),
            Err(BeginRefusal::MissingGarment)
        );
        assert!(state.selected_color().is_none());

        state.set_garment(image("garment.jpg"));
        let ticket = state.begin_composition("#1A2B3C".to_string()).unwrap();
        assert_eq!(state.selected_color(), Some("#1A2B3C"));
        assert!(state.finish_composition(ticket, image("composite.png")));
        assert_eq!(state.displayed_image().unwrap().source_name, "composite.png");
    }

    #[test]
    fn at_most_one_composition_in_flight() {
        let mut state = SessionState::new();
        state.set_subject(image("subject.jpg"));
        state.set_garment(image("garment.jpg"));
        let _ticket = state.begin_composition("#111111".to_string()).unwrap();
        assert_eq!(
            state.begin_composition("#222222".to_string()),
            Err(BeginRefusal::TrackBusy)
        );
        // The in-flight selection is untouched by the refused attempt.
        assert_eq!(state.selected_color(), Some("#111111"));
    }

    #[test]
    fn failure_clears_busy_sets_single_error_and_keeps_held_state() {
        let mut state = state_with_result();
        let held_result = state.result().cloned();
        let ticket = state.begin_restyle().unwrap();
        assert!(state.fail(ticket, "restyle failed".to_string()));
        assert!(!state.any_busy());
        assert_eq!(state.error(), Some("restyle failed"));
        assert_eq!(state.result().cloned(), held_result);
        assert!(state.palette().is_some());

        // A later failure replaces, not accumulates, the message.
        let ticket = state.begin_restyle().unwrap();
        assert!(state.fail(ticket, "second failure".to_string()));
        assert_eq!(state.error(), Some("second failure"));
    }

    #[test]
    fn restyle_requires_result_and_preserves_palette_and_selection() {
        let mut state = SessionState::new();
        state.set_subject(image("subject.jpg"));
        assert_eq!(state.begin_restyle(), Err(BeginRefusal::MissingResult));

        let mut state = state_with_result();
        let ticket = state.begin_restyle().unwrap();
        assert!(state.finish_restyle(ticket, image("restyled.png")));
        assert_eq!(state.displayed_image().unwrap().source_name, "restyled.png");
        assert!(state.palette().is_some());
        assert_eq!(state.selected_color(), Some("#1A2B3C"));
    }

    #[test]
    fn stale_analysis_resolution_is_discarded() {
        let mut state = SessionState::new();
        state.set_subject(image("subject.jpg"));
        let ticket = state.begin_analysis().unwrap();
        // Subject replaced while the request is in flight.
        state.set_subject(image("newer.jpg"));
        assert!(!state.finish_analysis(ticket, palette()));
        assert!(state.palette().is_none());
        assert!(!state.is_busy(Track::Analysis));
    }

    #[test]
    fn stale_failure_is_discarded_silently() {
        let mut state = SessionState::new();
        state.set_subject(image("subject.jpg"));
        state.set_garment(image("garment.jpg"));
        let ticket = state.begin_composition("#1A2B3C".to_string()).unwrap();
        state.set_garment(image("other.jpg"));
        assert!(!state.fail(ticket, "late failure".to_string()));
        assert!(state.error().is_none());
    }

    #[test]
    fn displayed_image_prefers_result_then_subject() {
        let mut state = SessionState::new();
        assert!(state.displayed_image().is_none());
        state.set_subject(image("subject.jpg"));
        assert_eq!(state.displayed_image().unwrap().source_name, "subject.jpg");
        let state = state_with_result();
        assert_eq!(state.displayed_image().unwrap().source_name, "composite.png");
    }

    #[test]
    fn analysis_reentry_clears_previous_palette_before_the_call() {
        let mut state = state_with_result();
        let _ticket = state.begin_analysis().unwrap();
        assert!(state.palette().is_none());
        assert!(state.selected_color().is_none());
        assert!(state.result().is_none());
    }
}
