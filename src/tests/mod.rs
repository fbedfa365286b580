//! End-to-end log scenarios (S1-S6), one file per concern.
