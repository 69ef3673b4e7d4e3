pub struct StaffSeed {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub short_name: String,
    pub category: &'static str,
}

pub struct SubjectSeed {
    pub code: String,
    pub short_name: String,
    pub full_name: String,
}

#[derive(Clone, Debug)]
pub struct SeedConfig {
    pub staff: usize,
    pub subjects: usize,
    pub departments: usize,
    pub batches_per_department: usize,
    pub faculty_per_batch: usize,
    pub year: String,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            staff: 30,
            subjects: 12,
            departments: 4,
            batches_per_department: 3,
            faculty_per_batch: 4,
            year: "2024-25".to_string(),
        }
    }
}

impl SeedConfig {
    pub fn total_batches(&self) -> usize {
        self.departments * self.batches_per_department
    }
}
