//! Data types shared by the services and the HTTP layer.
//!
//! Row types derive `sqlx::FromRow`; request payloads derive `Deserialize`
//! and, where fields are mandatory, `validator::Validate`.

pub mod catalog;
pub mod imaging;
pub mod lab;
pub mod medication;
pub mod nursing;
pub mod patient;
pub mod record;
pub mod supply;

pub use catalog::{Icd10Code, Icd10Option, IdList, SearchQuery};
pub use imaging::{ImagingStudy, NewImagingStudy, StudyKind, StudyNotes};
pub use lab::{
    LabExam, LabExamDetail, LabParameter, LabRequest, LabRequestDetail, LabResult, LabStatus, NewLabExam,
    NewLabParameter, NewLabRequest, ResultEntry,
};
pub use medication::{
    AdministrationEdit, Medication, MedicationAdministration, NewAdministration, NewMedication, PrescribedMedication,
};
pub use nursing::{FluidIntake, FluidOutput, NewNote, NewNursingEntry, NoteKind, NursingEntry, ShiftSheet, Vitals};
pub use patient::{NewPatient, Patient, PatientInfo, PatientPage, PatientSearch, PatientSummary, SearchCriterion};
pub use record::{
    AdmissionForm, AdmissionVitals, ClinicalRecord, LabOrderItem, MedicalOrder, NewOrder, OrderView, PrescribedLine,
    RecordDetails, RecordView,
};
pub use supply::{NewSupplyItem, NewSupplyUsage, SupplyItem, SupplyUsage};
