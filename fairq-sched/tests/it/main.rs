mod fairness;
mod ordering;
