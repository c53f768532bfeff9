pub struct CommitDialog {
    message: String,
    file_count: usize,
    is_open: bool,
}

impl CommitDialog {
    pub fn new() -> Self {
        Self {
            message: String::new(),
            file_count: 0,
            is_open: false,
        }
    }

    pub fn open(&mut self, file_count: usize) {
        self.file_count = file_count;
        self.is_open = true;
        self.message.clear();
    }

    pub fn close(&mut self) {
        self.is_open = false;
        self.message.clear();
        self.file_count = 0;
    }

    pub fn push(&mut self, c: char) {
        self.message.push(c);
    }

    pub fn backspace(&mut self) {
        self.message.pop();
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn file_count(&self) -> usize {
        self.file_count
    }

    pub fn is_open(&self) -> bool {
        self.is_open
    }
}
