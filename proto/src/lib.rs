//! Generated protobuf and gRPC types for the quiz service.

tonic::include_proto!("quiz");
