#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Stats {
    connects: u32,
    disconnects: u32,
    connect_errors: u32,
    events_sent: u64,
    events_received: u64,
}

impl Stats {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_connect(&mut self) {
        self.connects += 1;
    }

    pub(crate) fn record_disconnect(&mut self) {
        self.disconnects += 1;
    }

    pub(crate) fn record_connect_error(&mut self) {
        self.connect_errors += 1;
    }

    pub(crate) fn record_sent(&mut self) {
        self.events_sent += 1;
    }

    pub(crate) fn record_received(&mut self) {
        self.events_received += 1;
    }

    pub fn connects(&self) -> u32 {
        self.connects
    }

    pub fn disconnects(&self) -> u32 {
        self.disconnects
    }

    pub fn connect_errors(&self) -> u32 {
        self.connect_errors
    }

    pub fn events_sent(&self) -> u64 {
        self.events_sent
    }

    pub fn events_received(&self) -> u64 {
        self.events_received
    }
}
